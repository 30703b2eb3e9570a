//! Client classification for audit records
//!
//! The IP comes from the first usable forwarding header, then the socket
//! peer. Device and OS are a coarse reading of the `User-Agent`.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use federa_core::ClientInfo;

const UNKNOWN: &str = "Unknown";

/// Checked in order; the first valid address wins.
const FORWARDING_HEADERS: [&str; 4] = [
    "X-Forwarded-For",
    "Proxy-Client-IP",
    "WL-Proxy-Client-IP",
    "X-Real-IP",
];

static TABLET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)ipad|tablet|kindle|silk|playbook").unwrap());

static MOBILE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)mobi|iphone|ipod|windows phone|blackberry|opera mini").unwrap());

static DESKTOP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)windows nt|macintosh|x11|linux|\bcros\b").unwrap());

static IOS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:iphone|ipad|ipod).*? os (\d+(?:_\d+)*)").unwrap());

static ANDROID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)android (\d+(?:\.\d+)*)").unwrap());

static WINDOWS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)windows nt (\d+(?:\.\d+)*)").unwrap());

static MACOS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)mac os x (\d+(?:[_.]\d+)*)").unwrap());

/// Client IP from forwarding headers, then the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<String> {
    FORWARDING_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| {
            value
                .split(',')
                .next()
                .map(str::trim)
                .and_then(|candidate| candidate.parse::<IpAddr>().ok())
        })
        .or(peer)
        .map(normalize_ip)
}

/// IPv6 loopback is reported as `127.0.0.1`.
fn normalize_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V6(v6) if v6.is_loopback() => Ipv4Addr::LOCALHOST.to_string(),
        other => other.to_string(),
    }
}

/// `Desktop`, `Mobile`, `Tablet` or `Unknown`
pub fn device_type(user_agent: &str) -> &'static str {
    if user_agent.trim().is_empty() {
        UNKNOWN
    } else if TABLET_REGEX.is_match(user_agent) || is_android_tablet(user_agent) {
        "Tablet"
    } else if MOBILE_REGEX.is_match(user_agent) {
        "Mobile"
    } else if DESKTOP_REGEX.is_match(user_agent) {
        "Desktop"
    } else {
        UNKNOWN
    }
}

/// Android devices that do not advertise `Mobile` are tablets
fn is_android_tablet(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    ua.contains("android") && !ua.contains("mobile")
}

/// Operating system name and version
pub fn operating_system(user_agent: &str) -> (String, String) {
    let version = |re: &Regex| {
        re.captures(user_agent)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().replace('_', "."))
    };
    let os = |name: &str, v: Option<String>| {
        (name.to_string(), v.unwrap_or_else(|| UNKNOWN.to_string()))
    };

    let ua = user_agent.to_ascii_lowercase();
    if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        os("iOS", version(&IOS_REGEX))
    } else if ua.contains("android") {
        os("Android", version(&ANDROID_REGEX))
    } else if ua.contains("windows") {
        os("Windows", version(&WINDOWS_REGEX))
    } else if ua.contains("mac os x") || ua.contains("macintosh") {
        os("macOS", version(&MACOS_REGEX))
    } else if ua.contains("cros ") {
        os("Chrome OS", None)
    } else if ua.contains("linux") || ua.contains("x11") {
        os("Linux", None)
    } else {
        os(UNKNOWN, None)
    }
}

pub fn client_info(headers: &HeaderMap, peer: Option<IpAddr>) -> ClientInfo {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let (os_name, os_version) = operating_system(user_agent);

    ClientInfo {
        ip: client_ip(headers, peer),
        device_type: device_type(user_agent).to_string(),
        os_name,
        os_version,
    }
}

/// Extractor for the caller's [`ClientInfo`]; never rejects.
#[derive(Debug, Clone)]
pub struct RequestClient(pub ClientInfo);

impl<S> FromRequestParts<S> for RequestClient
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(Self(client_info(&parts.headers, peer)))
    }
}
