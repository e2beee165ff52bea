//! Shared document types and helpers for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use live_config::codec::{CodecError, CodecFactory, ScalarCodec};
use live_config::node::{Node, NodeValue, Scalar};
use live_config::settings::StoreSettings;
use live_config::{ConfigStore, Document, FieldDescriptor};

/// Per-server settings, loaded from `configs/{server}/settings.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub motd: String,
    pub max_players: u32,
    pub whitelist: bool,
    pub spawn: Spawn,
    pub team_size: TeamSize,
    pub ranks: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spawn {
    pub world: String,
    pub y: f64,
}

/// Written on disk as `min-max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamSize {
    pub min: u32,
    pub max: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            motd: "Welcome!".into(),
            max_players: 20,
            whitelist: false,
            spawn: Spawn::default(),
            team_size: TeamSize { min: 2, max: 4 },
            ranks: BTreeMap::from([("default".to_string(), 0)]),
        }
    }
}

impl Default for Spawn {
    fn default() -> Self {
        Self {
            world: "world".into(),
            y: 64.0,
        }
    }
}

impl Document for ServerSettings {
    const KIND: &'static str = "server";

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("motd").comment("Shown in the server list"),
            FieldDescriptor::new("max_players").codec("int"),
            FieldDescriptor::new("team_size").codec("team-size").comment("Players per team, as min-max"),
            FieldDescriptor::new("ranks").atomic().comment("Rank name to permission level"),
        ]
    }

    fn codecs() -> Vec<CodecFactory> {
        vec![CodecFactory::of::<TeamSizeCodec>()]
    }
}

#[derive(Debug, Default)]
pub struct TeamSizeCodec;

impl ScalarCodec for TeamSizeCodec {
    fn name(&self) -> &str {
        "team-size"
    }

    fn decode(&self, scalar: &Scalar) -> Result<Node, CodecError> {
        let text = scalar.as_text();
        let (min, max) = text
            .split_once('-')
            .ok_or_else(|| CodecError::new(format!("`{}` is not a min-max range", text)))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<i64>()
                .map_err(|_| CodecError::new(format!("`{}` is not a number", part)))
        };
        Ok(Node::mapping(vec![
            ("min".into(), Node::scalar(parse(min)?)),
            ("max".into(), Node::scalar(parse(max)?)),
        ]))
    }

    fn encode(&self, node: &Node) -> Result<Scalar, CodecError> {
        let bound = |key: &str| match node.get(key).map(Node::value) {
            Some(NodeValue::Scalar(Scalar::Int(i))) => Ok(*i),
            _ => Err(CodecError::new(format!("missing `{}`", key))),
        };
        Ok(Scalar::Str(format!("{}-{}", bound("min")?, bound("max")?)))
    }
}

/// An arena definition, one file per arena in a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Arena {
    pub name: String,
    pub teams: u32,
    pub rewards: Vec<Reward>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub item: String,
    pub amount: u32,
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            name: "arena".into(),
            teams: 2,
            rewards: vec![Reward {
                item: "minecraft:diamond".into(),
                amount: 1,
            }],
        }
    }
}

impl Document for Arena {
    const KIND: &'static str = "arena";

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("rewards").atomic(),
            FieldDescriptor::new("rewards.*.item").comment("Namespaced item id"),
        ]
    }
}

pub fn arena(name: &str, teams: u32) -> Arena {
    Arena {
        name: name.into(),
        teams,
        ..Arena::default()
    }
}

/// Store rooted at `base`, with or without live reload.
pub fn store(base: &Path, live: bool) -> ConfigStore {
    let mut settings = StoreSettings::default();
    settings.documents.base_dir = base.to_path_buf();
    settings.watch.enabled = live;
    settings.watch.debounce_ms = 50;
    ConfigStore::new(settings)
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}
