// Copyright (C) 2021  Anthony DeDominic <adedomin@gmail.com>

// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::Deserialize;

use crate::irc::limits::{DEFAULT_QUEUE_CAPACITY, DEFAULT_REASSEMBLER_CAPACITY, MAX_NICK_LENGTH};
use crate::irc::worker::WorkerConfig;

#[derive(Deserialize, Debug)]
pub struct Config {
    pub general: General,
}

#[derive(Deserialize, Debug)]
pub struct General {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_server_name")]
    pub server_name: String,
    #[serde(default = "default_max_nick_length")]
    pub max_nick_length: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_reassembler_capacity")]
    pub reassembler_capacity: usize,
    #[serde(default)]
    pub motd_file: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    6667
}

fn default_server_name() -> String {
    "irc.localhost".to_string()
}

fn default_max_nick_length() -> usize {
    MAX_NICK_LENGTH
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_reassembler_capacity() -> usize {
    DEFAULT_REASSEMBLER_CAPACITY
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not open/read config file: {0}")]
    IO(#[from] io::Error),
    #[error("could not parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Config {
    pub fn from_str(c: &str) -> Result<Config, ConfigError> {
        toml::from_str::<Config>(c).map_err(|e| e.into())
    }

    pub fn from_path(p: &Path) -> Result<Config, ConfigError> {
        let mut f = File::open(&p)?;
        let mut c = String::new();
        f.read_to_string(&mut c)?;
        Config::from_str(c.as_ref())
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.general.bind_address, self.general.port)
    }

    pub fn server_name(&self) -> &str {
        &self.general.server_name
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            queue_capacity: self.general.queue_capacity,
            reassembler_capacity: self.general.reassembler_capacity,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_fill_in_missing_fields() {
        let cfg = Config::from_str("[general]\n").unwrap();
        assert_eq!(cfg.general.bind_address, "0.0.0.0");
        assert_eq!(cfg.general.port, 6667);
        assert_eq!(cfg.general.max_nick_length, MAX_NICK_LENGTH);
        assert_eq!(cfg.listen_address(), "0.0.0.0:6667");
    }

    #[test]
    fn explicit_values_override_defaults() {
        let cfg = Config::from_str(
            "[general]\nbind_address = \"127.0.0.1\"\nport = 6697\nserver_name = \"irc.example.org\"\n",
        )
        .unwrap();
        assert_eq!(cfg.listen_address(), "127.0.0.1:6697");
        assert_eq!(cfg.server_name(), "irc.example.org");
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(Config::from_str("not valid toml [[[").is_err());
    }
}
