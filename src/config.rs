//! Configuration for `init(region, size, root_bits, rec_len, flags)`,
//! validated once at `HTrie::open`.
//!
//! Loading a `Config` from a file or CLI flags is out of scope here;
//! what is in scope is this validated in-memory value and the
//! `Display` impl logging reaches for.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::err_at;
use crate::error::{Error, Result};
use crate::offset::{CACHE_LINE, MINDREC};
use crate::record::Mode;

/// Addressable space at one `DATA_BIT`-tagged shift's 31-bit unit budget,
/// data-granularity: `2^31 * MINDREC` bytes (≈128 GB).
pub const MAX_SHARD_SZ: u64 = (1u64 << 31) * MINDREC as u64;

/// Store-wide configuration. `rec_len == 0` selects variable-length
/// mode unconditionally; `inplace` is only meaningful when `rec_len >
/// 0`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Root fanout exponent: root index has `1 << root_bits` children.
    /// Must be a multiple of 4, at least 4.
    pub root_bits: u32,
    /// Fixed record length; `0` selects variable-length mode.
    pub rec_len: usize,
    /// Fixed-length inplace mode (record body lives in the bucket slot).
    /// Ignored when `rec_len == 0`.
    pub inplace: bool,
    /// Total bytes of the backing region.
    pub db_size: usize,
    /// Number of concurrent workers the epoch table reserves a slot for.
    pub workers: usize,
}

impl Config {
    /// A variable-length-mode config with the given root fanout, sized
    /// for `workers` concurrent callers.
    pub fn varlen(root_bits: u32, db_size: usize, workers: usize) -> Config {
        Config {
            root_bits,
            rec_len: 0,
            inplace: false,
            db_size,
            workers,
        }
    }

    /// Like [`Config::varlen`], but sizes the epoch table for
    /// `num_cpus::get()` workers — one per hardware thread, the usual
    /// default for a store whose callers are not pinned to a fixed
    /// worker pool.
    pub fn varlen_auto(root_bits: u32, db_size: usize) -> Config {
        Config::varlen(root_bits, db_size, num_cpus::get())
    }

    /// A fixed-length config; `inplace` selects the inplace-vs-indirect
    /// storage mode.
    pub fn fixed(root_bits: u32, rec_len: usize, inplace: bool, db_size: usize, workers: usize) -> Config {
        Config {
            root_bits,
            rec_len,
            inplace,
            db_size,
            workers,
        }
    }

    /// The record-storage mode this config resolves to.
    pub fn mode(&self) -> Mode {
        if self.rec_len == 0 {
            Mode::Varlen
        } else if self.inplace {
            Mode::Inplace
        } else {
            Mode::Indirect
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.root_bits < 4 || self.root_bits % 4 != 0 {
            return err_at!(InvalidConfig, msg: "root_bits {} must be a multiple of 4, >= 4", self.root_bits);
        }
        if self.root_bits > 32 {
            return err_at!(InvalidConfig, msg: "root_bits {} exceeds a 32-bit key-branch budget", self.root_bits);
        }
        if self.rec_len == 0 && self.inplace {
            return err_at!(InvalidConfig, msg: "INPLACE requires rec_len > 0 (rec_len=0 selects varlen mode)");
        }
        if self.inplace && self.rec_len > MINDREC / 2 {
            return err_at!(
                InvalidConfig,
                msg: "inplace rec_len {} exceeds TDB_BLK_SZ/2 ({})",
                self.rec_len,
                MINDREC / 2
            );
        }
        if self.db_size == 0 {
            return err_at!(InvalidConfig, msg: "db_size must be non-zero");
        }
        if self.db_size as u64 > MAX_SHARD_SZ {
            return err_at!(InvalidConfig, msg: "db_size {} exceeds MAX_SHARD_SZ {}", self.db_size, MAX_SHARD_SZ);
        }
        if self.db_size < CACHE_LINE * 64 {
            return err_at!(InvalidConfig, msg: "db_size {} too small to hold header, root and one extent", self.db_size);
        }
        if self.workers == 0 {
            return err_at!(InvalidConfig, msg: "workers must be non-zero");
        }
        Ok(())
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{ root_bits: {}, rec_len: {}, mode: {:?}, db_size: {}, workers: {} }}",
            self.root_bits,
            self.rec_len,
            self.mode(),
            self.db_size,
            self.workers,
        )
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
