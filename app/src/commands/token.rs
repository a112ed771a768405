// `autobuild token`

use std::io::BufRead;

use clap::Subcommand;

use autobuild_lib::utils::{mask_secret, CredentialStore};
use autobuild_lib::{AutobuildError, AutobuildResult};

use super::Context;

#[derive(Debug, Subcommand)]
pub enum TokenAction {
    /// Store a GitHub personal access token (scopes: repo, workflow)
    Set {
        /// Token value; read from stdin when omitted
        token: Option<String>,
    },
    /// Show the stored token, masked
    Show,
    /// Remove the stored token
    Clear,
}

fn read_token_from_stdin() -> AutobuildResult<String> {
    eprintln!("Enter your GitHub Personal Access Token (PAT).");
    eprintln!("Required scopes: repo, workflow");
    eprintln!("Create one at: https://github.com/settings/tokens");

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Describe what the store holds without revealing the token
pub fn describe(store: &CredentialStore) -> AutobuildResult<String> {
    Ok(match store.token()? {
        Some(token) => format!("Token: {} ({})", mask_secret(&token), store.path().display()),
        None => "No token stored. Run `autobuild token set`.".to_string(),
    })
}

pub fn execute(ctx: &Context, action: TokenAction) -> AutobuildResult<()> {
    match action {
        TokenAction::Set { token } => {
            let token = match token {
                Some(token) => token,
                None => read_token_from_stdin()?,
            };
            if token.trim().is_empty() {
                return Err(AutobuildError::validation(
                    "Token required to trigger workflows",
                ));
            }
            ctx.store.set_token(&token)?;
            println!("Token saved! You can now run workflows.");
            println!(
                "Workflow secrets: {}",
                ctx.repo()?.secrets_url()
            );
        }
        TokenAction::Show => println!("{}", describe(&ctx.store)?),
        TokenAction::Clear => {
            if ctx.store.clear_token()? {
                println!("Token removed.");
            } else {
                println!("No token was stored.");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use autobuild_lib::utils::AppConfig;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> Context {
        Context {
            config: AppConfig::default(),
            store: CredentialStore::new(dir.path().join("credentials.json")),
        }
    }

    #[test]
    fn test_set_show_clear() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);

        execute(
            &ctx,
            TokenAction::Set {
                token: Some("ghp_1234567890abcd".to_string()),
            },
        )
        .unwrap();
        let shown = describe(&ctx.store).unwrap();
        assert!(shown.starts_with("Token: ghp_**********abcd"));
        assert!(ctx.repo().unwrap().token == "ghp_1234567890abcd");

        execute(&ctx, TokenAction::Clear).unwrap();
        assert!(describe(&ctx.store).unwrap().starts_with("No token stored"));
        assert!(ctx.authorized_repo().is_err());
    }

    #[test]
    fn test_blank_token_rejected() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let err = execute(
            &ctx,
            TokenAction::Set {
                token: Some("  ".to_string()),
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Token required to trigger workflows");
    }
}
