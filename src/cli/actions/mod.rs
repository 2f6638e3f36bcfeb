pub mod server;

use crate::api::email::MailerConfig;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        mailer: MailerConfig,
    },
}
