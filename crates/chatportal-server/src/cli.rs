use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chatportal-server", about = "Chat portal API server")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/chatportal.toml")]
    pub config: String,

    /// Create the first super admin with this login id when no admin exists.
    /// The password is read from CHATPORTAL_BOOTSTRAP_PASSWORD.
    #[arg(long, value_name = "LOGIN_ID")]
    pub bootstrap_super_admin: Option<String>,
}
