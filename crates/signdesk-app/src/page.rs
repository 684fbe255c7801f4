//! Terminal rendition of the sign-up/sign-in page.
//!
//! Each loop iteration renders the current view, reads one command and
//! prompts for the fields it needs, one per line.

use std::str::FromStr;

use signdesk_auth::{
    AuthController, AuthPhase, FormField, IdentityProvider, PageState, ProfileInput, Theme,
};
use signdesk_core::repository::{UserProfileRepository, UserRepository};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::session_file::{PersistentSession, SessionFile};

const HELP: &str = "\
Commands:
  signup   create an account
  signin   sign in with username and password
  signout  sign out
  profile  edit your profile (signed in only)
  theme    toggle light/dark theme
  dismiss  dismiss the error banner
  help     show this help
  quit     exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SignUp,
    SignIn,
    SignOut,
    Profile,
    Theme,
    Dismiss,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "signup" | "sign-up" | "register" => Ok(Command::SignUp),
            "signin" | "sign-in" | "login" => Ok(Command::SignIn),
            "signout" | "sign-out" | "logout" => Ok(Command::SignOut),
            "profile" => Ok(Command::Profile),
            "theme" => Ok(Command::Theme),
            "dismiss" => Ok(Command::Dismiss),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("Unknown command: {other}")),
        }
    }
}

/// Render the current view as plain text.
pub fn render(state: &PageState) -> String {
    let mut out = String::new();
    let theme = match state.theme {
        Theme::Light => "light",
        Theme::Dark => "dark",
    };
    out.push_str(&format!("--- signdesk [{theme}] ---\n"));

    if let Some(error) = &state.error {
        out.push_str(&format!("! {error} (type 'dismiss' to close)\n"));
    }
    if state.is_loading {
        out.push_str("... working\n");
    }

    match state.phase {
        AuthPhase::SignIn => {
            out.push_str("Sign in\n");
            out.push_str("  signin | signup | theme | help | quit\n");
        }
        AuthPhase::SignUp => {
            out.push_str("Create account\n");
            out.push_str("  signup | signin | theme | help | quit\n");
        }
        AuthPhase::SignedIn => {
            if let Some(user) = &state.user {
                out.push_str(&format!("Welcome, {}!\n", user.display_name()));
                out.push_str(&format!("  Username:   {}\n", user.username));
                out.push_str(&format!("  Email:      {}\n", user.email));
                out.push_str(&format!("  Roles:      {}\n", user.roles.join(", ")));
                if !user.groups.is_empty() {
                    out.push_str(&format!("  Groups:     {}\n", user.groups.join(", ")));
                }
                if let Some(last_login) = user.last_login {
                    out.push_str(&format!(
                        "  Last login: {}\n",
                        last_login.format("%Y-%m-%d %H:%M:%S UTC")
                    ));
                }
                if let Some(profile) = &user.profile {
                    for (label, value) in [
                        ("Bio", &profile.bio),
                        ("Website", &profile.website),
                        ("Location", &profile.location),
                    ] {
                        if let Some(value) = value {
                            out.push_str(&format!("  {label:<11} {value}\n"));
                        }
                    }
                }
            }
            out.push_str("  profile | signout | theme | help | quit\n");
        }
    }
    out
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub struct Page<'a, P, U, R>
where
    P: IdentityProvider + PersistentSession,
    U: UserRepository,
    R: UserProfileRepository,
{
    controller: &'a AuthController<P, U, R>,
    session_file: &'a SessionFile,
}

impl<'a, P, U, R> Page<'a, P, U, R>
where
    P: IdentityProvider + PersistentSession,
    U: UserRepository,
    R: UserProfileRepository,
{
    pub fn new(controller: &'a AuthController<P, U, R>, session_file: &'a SessionFile) -> Self {
        Self {
            controller,
            session_file,
        }
    }

    /// Run until `quit` or end of input.
    pub async fn run<In, Out>(&self, input: &mut In, output: &mut Out) -> std::io::Result<()>
    where
        In: AsyncBufRead + Unpin,
        Out: AsyncWrite + Unpin,
    {
        loop {
            output
                .write_all(render(&self.controller.state()).as_bytes())
                .await?;
            let Some(line) = prompt(input, output, "> ").await? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(message) => {
                    output.write_all(format!("{message}\n").as_bytes()).await?;
                    continue;
                }
            };

            if !self.dispatch(command, input, output).await? {
                break;
            }
        }
        output.flush().await
    }

    /// Returns `false` when the page should close.
    async fn dispatch<In, Out>(
        &self,
        command: Command,
        input: &mut In,
        output: &mut Out,
    ) -> std::io::Result<bool>
    where
        In: AsyncBufRead + Unpin,
        Out: AsyncWrite + Unpin,
    {
        let signed_in = self.controller.state().phase == AuthPhase::SignedIn;
        match command {
            Command::SignUp | Command::SignIn if signed_in => {
                output
                    .write_all(b"Already signed in; sign out first.\n")
                    .await?;
            }
            Command::SignUp => {
                self.controller.show_sign_up();
                for field in [
                    FormField::Username,
                    FormField::Password,
                    FormField::Email,
                    FormField::GivenName,
                    FormField::FamilyName,
                ] {
                    if !self.read_field(field, input, output).await? {
                        return Ok(false);
                    }
                }
                // Outcome is reflected in the page state.
                let _ = self.controller.sign_up().await;
                self.persist_session().await;
            }
            Command::SignIn => {
                self.controller.show_sign_in();
                for field in [FormField::Username, FormField::Password] {
                    if !self.read_field(field, input, output).await? {
                        return Ok(false);
                    }
                }
                let _ = self.controller.sign_in().await;
                self.persist_session().await;
            }
            Command::SignOut => {
                let _ = self.controller.sign_out().await;
                self.persist_session().await;
            }
            Command::Profile if !signed_in => {
                output.write_all(b"Sign in to edit your profile.\n").await?;
            }
            Command::Profile => {
                let mut values = Vec::with_capacity(3);
                for label in ["Bio", "Website", "Location"] {
                    let Some(value) = prompt(input, output, &format!("{label}: ")).await? else {
                        return Ok(false);
                    };
                    values.push(non_empty(value));
                }
                let mut values = values.into_iter();
                let _ = self
                    .controller
                    .save_profile(ProfileInput {
                        bio: values.next().flatten(),
                        website: values.next().flatten(),
                        location: values.next().flatten(),
                    })
                    .await;
            }
            Command::Theme => {
                self.controller.toggle_theme();
            }
            Command::Dismiss => self.controller.dismiss_error(),
            Command::Help => {
                output.write_all(format!("{HELP}\n").as_bytes()).await?;
            }
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    async fn read_field<In, Out>(
        &self,
        field: FormField,
        input: &mut In,
        output: &mut Out,
    ) -> std::io::Result<bool>
    where
        In: AsyncBufRead + Unpin,
        Out: AsyncWrite + Unpin,
    {
        let Some(value) = prompt(input, output, &format!("{}: ", field.label())).await? else {
            return Ok(false);
        };
        // Passwords are taken verbatim; surrounding spaces are significant.
        let value = match field {
            FormField::Password => value,
            _ => value.trim().to_string(),
        };
        self.controller.set_field(field, value);
        Ok(true)
    }

    async fn persist_session(&self) {
        let token = self
            .controller
            .provider()
            .and_then(PersistentSession::session_token);
        if let Err(e) = self.session_file.store(token.as_deref()).await {
            warn!(error = %e, "Failed to persist session token");
        }
    }
}

/// Write `label` and read one line. `None` at end of input.
async fn prompt<In, Out>(
    input: &mut In,
    output: &mut Out,
    label: &str,
) -> std::io::Result<Option<String>>
where
    In: AsyncBufRead + Unpin,
    Out: AsyncWrite + Unpin,
{
    output.write_all(label.as_bytes()).await?;
    output.flush().await?;

    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}
