//! Configuration access port trait.
//!
//! Typed getters return the default when the key is absent and a
//! `ConfigInvalid` error when it is present but unparseable.

use crate::domain::error::FutalphaError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, FutalphaError>;
    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, FutalphaError>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, FutalphaError>;
}
