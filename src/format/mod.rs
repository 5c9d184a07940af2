//! Request renderings - raw wire text, cURL, JavaScript `fetch` and Python
//! `requests` snippets.
//!
//! All four are pure functions of the same [`EffectiveRequest`].

pub mod curl;
pub mod fetch;
pub mod python;
pub mod raw;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::Request;
use crate::resolve::{resolve, EffectiveRequest};

pub use curl::{parse_curl, to_curl};

/// Supported rendering formats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Raw,
    Curl,
    Fetch,
    Python,
}

impl Format {
    pub const ALL: [Format; 4] = [Format::Raw, Format::Curl, Format::Fetch, Format::Python];

    pub fn as_str(&self) -> &str {
        match self {
            Format::Raw => "raw",
            Format::Curl => "curl",
            Format::Fetch => "fetch",
            Format::Python => "python",
        }
    }

    pub fn render(&self, effective: &EffectiveRequest) -> String {
        match self {
            Format::Raw => raw::render(effective),
            Format::Curl => curl::to_curl(effective),
            Format::Fetch => fetch::render(effective),
            Format::Python => python::render(effective),
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(Format::Raw),
            "curl" => Ok(Format::Curl),
            "fetch" => Ok(Format::Fetch),
            "python" => Ok(Format::Python),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every rendering of one request
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestFormats {
    pub raw: String,
    pub curl: String,
    pub fetch: String,
    pub python: String,
}

/// Render `request` in the format called `name`
pub fn get_format(request: &Request, name: &str) -> Result<String> {
    let format: Format = name.parse()?;
    Ok(format.render(&resolve(request)))
}

pub fn all_formats(request: &Request) -> RequestFormats {
    let effective = resolve(request);
    RequestFormats {
        raw: raw::render(&effective),
        curl: curl::to_curl(&effective),
        fetch: fetch::render(&effective),
        python: python::render(&effective),
    }
}
