//! Video decoder seam
//!
//! Decoding needs a native codec that is not always available, so it is
//! injected into [`VideoIngest`](super::VideoIngest) as an optional
//! dependency rather than detected at runtime.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use url::Url;

use crate::error::{DecodeError, StreamError};

/// Decoded picture, packed RGB8
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl RawFrame {
    /// Single-colour frame
    pub fn solid(width: u32, height: u32, color: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            rgb: color.repeat(pixels),
        }
    }

    /// Whether the buffer length matches the dimensions
    pub fn is_consistent(&self) -> bool {
        self.rgb.len() == self.width as usize * self.height as usize * 3
    }
}

/// Factory for capture handles
pub trait VideoDecoder: Send + Sync {
    /// Capability name shown when it is missing or fails
    fn name(&self) -> &str;

    /// Open a capture handle on the stream URL
    fn open(&self, source: &str) -> Result<Box<dyn FrameCapture>, StreamError>;
}

/// An open video stream; dropped to release it
pub trait FrameCapture: Send {
    /// Block until the next frame is decoded or the read fails
    fn read_frame(&mut self) -> Result<RawFrame, DecodeError>;
}

/// Resolve a `udp://[@]host:port` stream URL into a local bind address.
///
/// The `@` form (`udp://@0.0.0.0:11111`) means "listen"; an empty host
/// binds every interface.
pub fn parse_udp_source(source: &str) -> Result<SocketAddr, StreamError> {
    let url = Url::parse(source)
        .map_err(|e| StreamError::InvalidSource(format!("{}: {}", source, e)))?;

    if url.scheme() != "udp" {
        return Err(StreamError::InvalidSource(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    let port = url
        .port()
        .ok_or_else(|| StreamError::InvalidSource(format!("{}: missing port", source)))?;

    let host = url
        .host_str()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
        .unwrap_or("");
    let ip = if host.is_empty() {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        host.parse::<IpAddr>()
            .map_err(|_| StreamError::InvalidSource(format!("{}: host must be an IP", source)))?
    };

    Ok(SocketAddr::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tello_listen_url() {
        assert_eq!(
            parse_udp_source("udp://@0.0.0.0:11111").unwrap(),
            "0.0.0.0:11111".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn plain_host_and_port() {
        assert_eq!(
            parse_udp_source("udp://127.0.0.1:5000").unwrap(),
            "127.0.0.1:5000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn rejects_other_schemes_and_missing_port() {
        assert!(matches!(
            parse_udp_source("rtsp://10.0.0.1:554/live"),
            Err(StreamError::InvalidSource(_))
        ));
        assert!(matches!(
            parse_udp_source("udp://@0.0.0.0"),
            Err(StreamError::InvalidSource(_))
        ));
        assert!(parse_udp_source("not a url").is_err());
    }

    #[test]
    fn solid_frame_dimensions() {
        let frame = RawFrame::solid(4, 2, [1, 2, 3]);
        assert_eq!(frame.rgb.len(), 24);
        assert!(frame.is_consistent());
        assert_eq!(&frame.rgb[3..6], &[1, 2, 3]);
    }
}
