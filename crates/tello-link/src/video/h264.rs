//! H.264-over-UDP decoder backed by OpenH264
//!
//! The drone streams raw Annex-B H.264 to UDP port 11111, split into
//! datagrams of at most 1460 bytes. A shorter datagram closes an access
//! unit, which is then handed to the decoder in one piece.

use std::io::ErrorKind;
use std::net::UdpSocket;
use std::time::Duration;

use openh264::decoder::Decoder;
use openh264::formats::YUVSource;
use tracing::debug;

use super::decoder::{parse_udp_source, FrameCapture, RawFrame, VideoDecoder};
use crate::error::{DecodeError, StreamError};

const MAX_CHUNK: usize = 1460;
const READ_TIMEOUT: Duration = Duration::from_millis(500);
/// Drop a half-assembled access unit that grows past this
const MAX_ACCESS_UNIT: usize = 2 * 1024 * 1024;

/// Decodes the drone's raw H.264 feed
#[derive(Debug, Default, Clone, Copy)]
pub struct H264UdpDecoder;

impl VideoDecoder for H264UdpDecoder {
    fn name(&self) -> &str {
        "OpenH264"
    }

    fn open(&self, source: &str) -> Result<Box<dyn FrameCapture>, StreamError> {
        let addr = parse_udp_source(source)?;
        let socket = UdpSocket::bind(addr)
            .map_err(|e| StreamError::SourceOpen(format!("{}: {}", addr, e)))?;
        socket
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| StreamError::SourceOpen(format!("set read timeout: {}", e)))?;

        let decoder = Decoder::new()
            .map_err(|e| StreamError::SourceOpen(format!("decoder init: {}", e)))?;

        debug!(%addr, "H.264 capture opened");
        Ok(Box::new(H264Capture {
            socket,
            decoder,
            access_unit: Vec::with_capacity(64 * 1024),
            datagram: vec![0u8; 2048],
            rgb: Vec::new(),
        }))
    }
}

struct H264Capture {
    socket: UdpSocket,
    decoder: Decoder,
    access_unit: Vec<u8>,
    datagram: Vec<u8>,
    rgb: Vec<u8>,
}

impl H264Capture {
    /// Read datagrams until an access unit is complete
    fn next_access_unit(&mut self) -> Result<(), DecodeError> {
        loop {
            let len = match self.socket.recv(&mut self.datagram) {
                Ok(len) => len,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(DecodeError::Read("no video data".to_string()));
                }
                Err(e) => return Err(DecodeError::Read(e.to_string())),
            };

            self.access_unit.extend_from_slice(&self.datagram[..len]);
            if self.access_unit.len() > MAX_ACCESS_UNIT {
                self.access_unit.clear();
                return Err(DecodeError::Read("access unit too large".to_string()));
            }
            if len < MAX_CHUNK {
                return Ok(());
            }
        }
    }
}

impl FrameCapture for H264Capture {
    fn read_frame(&mut self) -> Result<RawFrame, DecodeError> {
        self.next_access_unit()?;

        let result = match self.decoder.decode(&self.access_unit) {
            Ok(Some(yuv)) => {
                let (width, height) = yuv.dimensions();
                self.rgb.resize(width * height * 3, 0);
                yuv.write_rgb8(&mut self.rgb);
                Ok(RawFrame {
                    width: width as u32,
                    height: height as u32,
                    rgb: std::mem::take(&mut self.rgb),
                })
            }
            Ok(None) => Err(DecodeError::Read("decoder needs more data".to_string())),
            Err(e) => Err(DecodeError::Read(e.to_string())),
        };

        self.access_unit.clear();
        result
    }
}
