//! Interactive selection helpers. Every prompt has a flag equivalent so
//! scripts never block on a terminal.

use crate::error::FmcError;
use crate::model::Domain;
use crate::rules::{AccessPolicy, NamedItem};
use anyhow::{Result, anyhow, bail};
use dialoguer::{Password, Select};
use std::io::IsTerminal;

/// Something listed by the FMC that can be picked by name or id.
pub trait Choice {
    fn name(&self) -> &str;
    fn id(&self) -> &str;
}

impl Choice for Domain {
    fn name(&self) -> &str {
        &self.name
    }
    fn id(&self) -> &str {
        &self.uuid
    }
}

impl Choice for NamedItem {
    fn name(&self) -> &str {
        &self.name
    }
    fn id(&self) -> &str {
        &self.id
    }
}

impl Choice for AccessPolicy {
    fn name(&self) -> &str {
        &self.name
    }
    fn id(&self) -> &str {
        &self.id
    }
}

pub fn is_interactive_terminal() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

/// Picks one of `items`: the entry matching `wanted` by name or id, the
/// only entry when there is exactly one, else a terminal prompt.
pub fn select<'a, T: Choice>(kind: &'static str, items: &'a [T], wanted: Option<&str>) -> Result<&'a T> {
    select_with(kind, items, wanted, is_interactive_terminal(), |names| {
        Select::new()
            .with_prompt(format!("Select {kind}"))
            .items(names)
            .default(0)
            .interact()
            .map_err(|e| anyhow!("{kind} prompt failed: {e}"))
    })
}

fn select_with<'a, T: Choice, F>(
    kind: &'static str,
    items: &'a [T],
    wanted: Option<&str>,
    interactive: bool,
    prompt: F,
) -> Result<&'a T>
where
    F: FnOnce(&[String]) -> Result<usize>,
{
    if let Some(wanted) = wanted {
        return items
            .iter()
            .find(|item| item.name() == wanted || item.id() == wanted)
            .ok_or_else(|| {
                FmcError::Lookup {
                    kind,
                    name: wanted.to_string(),
                }
                .into()
            });
    }
    match items {
        [] => bail!("no {kind} available on this FMC"),
        [only] => Ok(only),
        _ if !interactive => {
            let names: Vec<&str> = items.iter().map(Choice::name).collect();
            bail!(
                "several {kind}s available ({}); pick one with a flag",
                names.join(", ")
            )
        }
        _ => {
            let names: Vec<String> = items.iter().map(|i| i.name().to_string()).collect();
            let idx = prompt(&names)?;
            items
                .get(idx)
                .ok_or_else(|| anyhow!("{kind} selection out of range"))
        }
    }
}

pub fn prompt_password(username: &str, server: &str) -> Result<String> {
    if !is_interactive_terminal() {
        bail!("password is required; set FMCTL_PASSWORD or pass --password");
    }
    Password::new()
        .with_prompt(format!("Password for {username}@{server}"))
        .interact()
        .map_err(|e| anyhow!("password prompt failed: {e}"))
}
