//! Line-oriented shell over an [`AppCore`]

use std::io::Write;

use anyhow::{bail, Result};
use law_app::{AppCore, OperationReport, OperationStatus};
use law_core::RegistryError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const HELP: &str = "\
commands:
  users                                 list registered users
  refresh                               re-read the registry
  select <username>                     select a user
  selected                              show the selected user
  clear                                 clear the selection
  register <username> <address> <amt>   register a user
  redeem <amount>                       redeem tokens held by the signer
  reward <username> <amount>            mint tokens to a user
  ops                                   show the operation log
  metrics                               show counters as JSON
  whoami                                show the signing address
  help                                  show this text
  quit                                  leave the shell";

/// One parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Users,
    Refresh,
    Select(String),
    Selected,
    Clear,
    Register {
        username: String,
        address: String,
        amount: String,
    },
    Redeem(String),
    Reward {
        username: String,
        amount: String,
    },
    Ops,
    Metrics,
    WhoAmI,
    Help,
    Quit,
}

impl Command {
    /// Parse a line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, args)) = words.split_first() else {
            return Ok(None);
        };
        let command = match (name, args) {
            ("users" | "ls", []) => Self::Users,
            ("refresh", []) => Self::Refresh,
            ("select", [username]) => Self::Select((*username).to_string()),
            ("selected", []) => Self::Selected,
            ("clear", []) => Self::Clear,
            ("register", [username, address, amount]) => Self::Register {
                username: (*username).to_string(),
                address: (*address).to_string(),
                amount: (*amount).to_string(),
            },
            ("redeem", [amount]) => Self::Redeem((*amount).to_string()),
            ("reward", [username, amount]) => Self::Reward {
                username: (*username).to_string(),
                amount: (*amount).to_string(),
            },
            ("ops", []) => Self::Ops,
            ("metrics", []) => Self::Metrics,
            ("whoami", []) => Self::WhoAmI,
            ("help" | "?", []) => Self::Help,
            ("quit" | "exit", []) => Self::Quit,
            (
                "users" | "ls" | "refresh" | "select" | "selected" | "clear" | "register"
                | "redeem" | "reward" | "ops" | "metrics" | "whoami" | "help" | "quit" | "exit",
                _,
            ) => bail!("wrong number of arguments for '{name}' (try 'help')"),
            _ => bail!("unknown command '{name}' (try 'help')"),
        };
        Ok(Some(command))
    }
}

/// Whether the shell keeps reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Executes commands against one core and renders plain text.
pub struct Shell<'a> {
    core: &'a AppCore,
}

impl<'a> Shell<'a> {
    pub fn new(core: &'a AppCore) -> Self {
        Self { core }
    }

    fn symbol(&self) -> &str {
        &self.core.config().token_symbol
    }

    /// Read commands from `input` until EOF or `quit`.
    pub async fn run<R, W>(&self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        write!(out, "law> ")?;
        out.flush()?;
        while let Some(line) = lines.next_line().await? {
            match Command::parse(&line) {
                Ok(Some(command)) => {
                    if self.execute(command, out).await? == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => writeln!(out, "error: {e}")?,
            }
            write!(out, "law> ")?;
            out.flush()?;
        }
        writeln!(out)?;
        Ok(())
    }

    /// Run one command. Registry errors are printed, not returned.
    pub async fn execute<W: Write>(&self, command: Command, out: &mut W) -> Result<Flow> {
        let core = self.core;
        match command {
            Command::Users => self.print_users(out)?,
            Command::Refresh => match core.refresh().await {
                Ok(version) => {
                    writeln!(out, "snapshot v{version}: {} users", core.snapshot().len())?;
                }
                Err(e) => print_error(out, &e)?,
            },
            Command::Select(username) => match core.select(&username) {
                Some(user) => writeln!(out, "selected {} ({})", user.username, user.address)?,
                None => writeln!(out, "no user named '{username}'")?,
            },
            Command::Selected => match core.selected() {
                Some(user) => writeln!(
                    out,
                    "{} {} {} {}",
                    user.username,
                    user.address,
                    user.balance,
                    self.symbol()
                )?,
                None => writeln!(out, "nothing selected")?,
            },
            Command::Clear => core.clear_selection(),
            Command::Register {
                username,
                address,
                amount,
            } => {
                let result = core.register_user(&username, &address, &amount).await;
                self.print_outcome(out, result)?;
            }
            Command::Redeem(amount) => {
                let result = core.redeem(&amount).await;
                self.print_outcome(out, result)?;
            }
            Command::Reward { username, amount } => {
                let result = core.reward_user(&username, &amount).await;
                self.print_outcome(out, result)?;
            }
            Command::Ops => {
                let records = core.operations().records();
                if records.is_empty() {
                    writeln!(out, "no operations")?;
                }
                for record in records {
                    let tx = record
                        .tx_hash
                        .as_ref()
                        .map_or_else(|| "-".to_string(), ToString::to_string);
                    writeln!(out, "{} {} {} tx={}", record.id, record.request, record.status, tx)?;
                }
            }
            Command::Metrics => {
                writeln!(out, "{}", serde_json::to_string_pretty(&core.metrics())?)?;
            }
            Command::WhoAmI => match core.identity() {
                Some(identity) => writeln!(out, "{}", identity.address)?,
                None => writeln!(out, "not connected")?,
            },
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn print_users<W: Write>(&self, out: &mut W) -> Result<()> {
        let (snapshot, version) = self.core.snapshot_versioned();
        if snapshot.is_empty() {
            writeln!(out, "no users (snapshot v{version})")?;
            return Ok(());
        }
        let selected = self.core.selected().map(|u| u.username);
        for (i, user) in snapshot.iter().enumerate() {
            let marker = if selected.as_ref() == Some(&user.username) { '*' } else { ' ' };
            writeln!(
                out,
                "{marker}{:>3}  {:<16} {:<44} {} {}",
                i + 1,
                user.username,
                user.address,
                user.balance,
                self.symbol()
            )?;
        }
        writeln!(
            out,
            "total supply {} {} (snapshot v{version})",
            snapshot.total_supply(),
            self.symbol()
        )?;
        Ok(())
    }

    fn print_outcome<W: Write>(
        &self,
        out: &mut W,
        result: Result<OperationReport, RegistryError>,
    ) -> Result<()> {
        let report = match result {
            Ok(report) => report,
            Err(e) => return print_error(out, &e),
        };
        match &report.status {
            OperationStatus::Failed { error } => print_error(out, error)?,
            status => writeln!(out, "{} {} {status}", report.id, report.kind)?,
        }
        if let Some(Err(e)) = &report.refresh {
            writeln!(out, "warning: registry not refreshed: {e}")?;
        }
        Ok(())
    }
}

fn print_error<W: Write>(out: &mut W, error: &RegistryError) -> Result<()> {
    let category = error.category();
    writeln!(out, "{category} error: {error}")?;
    writeln!(out, "  hint: {}", category.resolution_hint())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use law_app::{LocalConnector, LocalLedger, StaticWallet};
    use law_core::{Address, RegistryConfig, SigningIdentity};

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    async fn core(signer: &str) -> AppCore {
        let ledger = LocalLedger::new(addr("0xC0"), addr("0xOWNER"));
        ledger.seed("alice", "0xA", "100").unwrap();
        ledger.seed("bob", "0xB", "50").unwrap();
        let core = AppCore::new(RegistryConfig {
            contract_address: "0xC0".to_string(),
            ..RegistryConfig::default()
        })
        .unwrap();
        core.connect(
            &StaticWallet::new(SigningIdentity::new(addr(signer))),
            &LocalConnector::new(ledger),
        )
        .await
        .unwrap();
        core
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert_eq!(
            Command::parse("register carol 0xC 5").unwrap(),
            Some(Command::Register {
                username: "carol".to_string(),
                address: "0xC".to_string(),
                amount: "5".to_string(),
            })
        );
        assert_eq!(Command::parse("exit").unwrap(), Some(Command::Quit));
        assert!(Command::parse("redeem").is_err());
        assert!(Command::parse("transfer 1").is_err());
    }

    #[tokio::test]
    async fn test_session_script() {
        let core = core("0xA").await;
        let shell = Shell::new(&core);
        let script = b"users\nselect alice\nredeem 30\nselected\nredeem abc\nops\nquit\nusers\n";
        let mut out = Vec::new();
        shell.run(&script[..], &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("total supply 150 LAW"));
        assert!(text.contains("op-1 redeem confirmed"));
        assert!(text.contains("alice 0xA 70 LAW"));
        assert!(text.contains("Input error: invalid input for amount"));
        assert!(text.contains("op-1 redeem(30) confirmed"));
        assert_eq!(text.matches("total supply").count(), 1);
    }

    #[tokio::test]
    async fn test_reverted_reward_is_printed() {
        let core = core("0xA").await;
        let mut out = Vec::new();
        Shell::new(&core)
            .execute(
                Command::Reward {
                    username: "bob".to_string(),
                    amount: "5".to_string(),
                },
                &mut out,
            )
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(
            text.starts_with("Operation error: reward failed: reverted: caller is not the owner")
        );
    }
}
