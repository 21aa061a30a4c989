//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            print!("{}", cfg.redacted().to_toml()?);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::active_path(global).display());
            Ok(())
        }

        ConfigCommand::SetPassword { ref jid } => {
            let jid = match jid {
                Some(jid) => jid.clone(),
                None => config::load(global)?
                    .xmpp
                    .jid
                    .ok_or_else(|| CliError::MissingSetting {
                        field: "xmpp.jid (or --jid)".into(),
                    })?,
            };

            let password = rpassword::prompt_password(format!("XMPP password for {jid}: "))?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                });
            }

            esmart_config::store_password(&jid, &password)?;
            eprintln!("Password stored in system keyring");
            Ok(())
        }
    }
}
