//! Async card-script database
//!
//! Every `*.json` file under the root directory holds one [`CardScript`].
//! Directory walking runs on a blocking thread (jwalk uses rayon
//! internally) and streams paths to the runtime, which starts reading and
//! parsing each file as soon as it is discovered.

use crate::core::types::normalize_name;
use crate::core::{CardScript, CardType, InMemoryRegistry};
use crate::{Result, RulesError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// A script file that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of scanning a script directory
#[derive(Debug)]
pub struct LoadReport {
    pub registry: InMemoryRegistry,
    /// Sorted by path
    pub failures: Vec<ScriptFailure>,
    pub duration: Duration,
}

impl LoadReport {
    pub fn loaded(&self) -> usize {
        self.registry.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Card scripts rooted at one directory
#[derive(Debug, Clone)]
pub struct CardDatabase {
    root: PathBuf,
}

impl CardDatabase {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CardDatabase { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load every script, failing on the first bad file
    pub async fn load(&self) -> Result<InMemoryRegistry> {
        let report = self.scan().await?;
        match report.failures.into_iter().next() {
            Some(failure) => Err(RulesError::InvalidCardScript(format!(
                "{}: {}",
                failure.path.display(),
                failure.reason
            ))),
            None => Ok(report.registry),
        }
    }

    /// Load every script, collecting failures instead of stopping
    pub async fn scan(&self) -> Result<LoadReport> {
        let start = Instant::now();
        tokio::fs::metadata(&self.root).await?;

        let root = self.root.clone();
        let (path_tx, mut path_rx) = mpsc::unbounded_channel::<PathBuf>();
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<(PathBuf, Result<CardScript>)>();

        let walker = tokio::task::spawn_blocking(move || {
            let mut failures = Vec::new();
            for entry in jwalk::WalkDir::new(&root).skip_hidden(true).sort(true) {
                match entry {
                    Ok(entry) => {
                        let path = entry.path();
                        let is_script = entry.file_type().is_file()
                            && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
                        if is_script && path_tx.send(path).is_err() {
                            break;
                        }
                    }
                    Err(e) => failures.push(ScriptFailure {
                        path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone()),
                        reason: e.to_string(),
                    }),
                }
            }
            failures
        });

        tokio::spawn(async move {
            while let Some(path) = path_rx.recv().await {
                let result_tx = result_tx.clone();
                tokio::spawn(async move {
                    let result = Self::load_script(&path).await;
                    let _ = result_tx.send((path, result));
                });
            }
        });

        let mut results = Vec::new();
        while let Some(result) = result_rx.recv().await {
            results.push(result);
        }
        let mut failures = walker.await?;
        results.sort_by(|a, b| a.0.cmp(&b.0));

        let mut registry = InMemoryRegistry::new();
        let mut seen: HashMap<String, PathBuf> = HashMap::new();
        for (path, result) in results {
            let script = match result {
                Ok(script) => script,
                Err(e) => {
                    failures.push(ScriptFailure { path, reason: e.to_string() });
                    continue;
                }
            };
            let name = script.card.as_ref().map(|c| c.name.as_str().to_string()).unwrap_or_default();
            let key = normalize_name(&name);
            if let Some(first) = seen.get(&key) {
                failures.push(ScriptFailure {
                    path,
                    reason: format!("duplicate card name '{}' (first defined in {})", name, first.display()),
                });
                continue;
            }
            seen.insert(key, path);
            registry.insert(&name, script);
        }
        failures.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(LoadReport { registry, failures, duration: start.elapsed() })
    }

    /// Read, parse and validate one script file
    pub async fn load_script(path: &Path) -> Result<CardScript> {
        let contents = tokio::fs::read_to_string(path).await?;
        let script: CardScript = serde_json::from_str(&contents)?;
        validate_script(&script)?;
        Ok(script)
    }
}

/// Structural checks a script must pass before it can be registered
pub fn validate_script(script: &CardScript) -> Result<()> {
    let card = script
        .card
        .as_ref()
        .ok_or_else(|| RulesError::InvalidCardScript("script has no card data".to_string()))?;
    let name = card.name.as_str();
    if name.trim().is_empty() {
        return Err(RulesError::InvalidCardScript("card name is empty".to_string()));
    }
    if card.types.is_empty() {
        return Err(RulesError::InvalidCardScript(format!("{}: no card types", name)));
    }
    if card.is_creature() && (card.power.is_none() || card.toughness.is_none()) {
        return Err(RulesError::InvalidCardScript(format!("{}: creature without power/toughness", name)));
    }
    if card.is_type(CardType::Planeswalker) && card.loyalty.is_none() {
        return Err(RulesError::InvalidCardScript(format!("{}: planeswalker without loyalty", name)));
    }
    let is_spell = card.is_type(CardType::Instant) || card.is_type(CardType::Sorcery);
    if is_spell && script.spell_effect.is_none() {
        return Err(RulesError::InvalidCardScript(format!("{}: instant or sorcery without an effect", name)));
    }
    if !script.targets.is_empty() && script.spell_effect.is_none() {
        return Err(RulesError::InvalidCardScript(format!("{}: targets without a spell effect", name)));
    }
    Ok(())
}
