use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::warn;

use authsync_core::session::{Action, SessionMachine, SessionStore, Settled};
use authsync_core::{
    token, ApiClient, Avatar, AvatarFile, Config, Credentials, NewAccount, ProfileUpdate,
};

use crate::render;

const ENV_PASSWORD: &str = "AUTHSYNC_PASSWORD";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Login { email: Option<String> },
    Register { username: String, email: String },
    Whoami,
    Update {
        username: Option<String>,
        email: Option<String>,
        avatar: Option<String>,
        password: bool,
    },
    Logout,
    Claims,
    Watch,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| anyhow!("missing command"))?;

        match name.as_str() {
            "login" => match rest {
                [] => Ok(Command::Login { email: None }),
                [email] => Ok(Command::Login {
                    email: Some(email.clone()),
                }),
                _ => bail!("login takes at most one argument"),
            },
            "register" => match rest {
                [username, email] => Ok(Command::Register {
                    username: username.clone(),
                    email: email.clone(),
                }),
                _ => bail!("register takes <username> <email>"),
            },
            "whoami" => Ok(Command::Whoami),
            "update" => Self::parse_update(rest),
            "logout" => Ok(Command::Logout),
            "claims" => Ok(Command::Claims),
            "watch" => Ok(Command::Watch),
            other => bail!("unknown command: {}", other),
        }
    }

    fn parse_update(args: &[String]) -> Result<Self> {
        let mut username = None;
        let mut email = None;
        let mut avatar = None;
        let mut password = false;

        let mut iter = args.iter();
        while let Some(flag) = iter.next() {
            let mut value = || {
                iter.next()
                    .cloned()
                    .ok_or_else(|| anyhow!("{} requires a value", flag))
            };
            match flag.as_str() {
                "--username" => username = Some(value()?),
                "--email" => email = Some(value()?),
                "--avatar" => avatar = Some(value()?),
                "--password" => password = true,
                other => bail!("unknown update flag: {}", other),
            }
        }

        if username.is_none() && email.is_none() && avatar.is_none() && !password {
            bail!("update needs at least one of --username, --email, --avatar, --password");
        }
        Ok(Command::Update {
            username,
            email,
            avatar,
            password,
        })
    }
}

pub async fn run(command: Command, config: &mut Config) -> Result<()> {
    let credentials = config.credential_store()?;
    let client = ApiClient::from_config(config)?;
    let machine = SessionMachine::with_client(Arc::new(SessionStore::new()), credentials, client);

    match command {
        Command::Login { email } => {
            let email = email
                .or_else(|| config.last_email.clone())
                .ok_or_else(|| anyhow!("no email given and none remembered"))?;
            let password = read_password("Password: ")?;

            let settled = machine.login(Credentials::new(email.clone(), password)).await;
            report(&machine, &settled)?;

            config.last_email = Some(email);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
        }
        Command::Register { username, email } => {
            let password = read_password("New password: ")?;
            let settled = machine
                .register(NewAccount {
                    username,
                    email,
                    password,
                })
                .await;
            report(&machine, &settled)?;
            println!("Account created. Run `authsync login` to sign in.");
        }
        Command::Whoami => {
            let settled = machine.check_auth().await;
            if settled.is_fulfilled() {
                println!("{}", render::session_line(&machine.snapshot().session));
            } else {
                println!("Not logged in");
            }
        }
        Command::Update {
            username,
            email,
            avatar,
            password,
        } => {
            if !machine.check_auth().await.is_fulfilled() {
                bail!("not logged in");
            }

            let mut update = ProfileUpdate {
                username,
                email,
                ..ProfileUpdate::default()
            };
            if let Some(avatar) = avatar {
                update.avatar = Some(load_avatar(&avatar)?);
            }
            if password {
                update.password = Some(read_password("New password: ")?);
            }

            let settled = machine.update_profile(update).await;
            report(&machine, &settled)?;
        }
        Command::Logout => {
            machine.logout();
            println!("Logged out");
        }
        Command::Claims => {
            let stored = machine
                .credentials()
                .load_access()?
                .ok_or_else(|| anyhow!("no stored access token"))?;
            let claims = token::decode(&stored)?;
            println!("{}", render::claims(&claims));
        }
        Command::Watch => {
            let mut watcher = machine.subscribe();
            let printer = tokio::spawn(async move {
                while let Some(snapshot) = watcher.changed().await {
                    println!("{}", render::snapshot_line(&snapshot));
                }
            });

            let settled = machine.dispatch(Action::CheckAuth).await?;
            // Dropping the machine closes the store and ends the printer
            drop(machine);
            printer.await?;
            if !settled.is_fulfilled() {
                println!("Not logged in");
            }
        }
    }
    Ok(())
}

/// Print the outcome, turning a rejection into an error for the exit code
fn report(machine: &SessionMachine, settled: &Settled) -> Result<()> {
    let session = machine.snapshot().session;
    if settled.is_fulfilled() {
        println!("{}", render::session_line(&session));
        return Ok(());
    }

    for line in render::field_errors(&session) {
        eprintln!("{}", line);
    }
    let message = session
        .error
        .unwrap_or_else(|| format!("{} failed", settled.operation));
    Err(anyhow!(message))
}

fn read_password(prompt: &str) -> Result<String> {
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        return Ok(password);
    }
    let password = rpassword::prompt_password(prompt)?;
    Ok(password)
}

fn load_avatar(source: &str) -> Result<Avatar> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return Ok(Avatar::Url(source.to_string()));
    }

    let path = Path::new(source);
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read avatar file: {}", source))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("avatar")
        .to_string();

    Ok(Avatar::File(AvatarFile {
        content_type: image_mime(&file_name).map(str::to_string),
        file_name,
        bytes,
    }))
}

fn image_mime(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
