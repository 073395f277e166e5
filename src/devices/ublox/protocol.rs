//! UBX protocol framing and NAV-PVT decoding
//! Frame format: [B5 62] [class] [id] [len u16 LE] [payload] [CK_A CK_B]

use crate::error::{Error, Result};
use crate::reading::{Reading, Source, Value};

pub const SYNC1: u8 = 0xB5;
pub const SYNC2: u8 = 0x62;

pub const CLASS_NAV: u8 = 0x01;
pub const ID_NAV_PVT: u8 = 0x07;

/// Sync (2) + class (1) + id (1) + payload length (2)
const HEADER_LEN: usize = 6;
/// Longest payload accepted before the stream is treated as desynced
const MAX_PAYLOAD_LEN: usize = 1024;
/// NAV-PVT payload size (protocol version 15 and later)
pub const NAV_PVT_PAYLOAD_LEN: usize = 92;

// NAV-PVT `valid` bitfield (byte 11)
const VALID_DATE: u8 = 0x01;
const VALID_TIME: u8 = 0x02;
const VALID_FULLY_RESOLVED: u8 = 0x04;

// NAV-PVT `flags` bitfield (byte 21)
const FLAGS_GNSS_FIX_OK: u8 = 0x01;
const FLAGS_DIFF_SOLN: u8 = 0x02;

/// UBX 8-bit Fletcher checksum over class, id, length and payload
#[inline]
pub fn checksum(data: &[u8]) -> (u8, u8) {
    let mut ck_a: u8 = 0;
    let mut ck_b: u8 = 0;
    for &byte in data {
        ck_a = ck_a.wrapping_add(byte);
        ck_b = ck_b.wrapping_add(ck_a);
    }
    (ck_a, ck_b)
}

/// Build a complete UBX frame around the given payload
pub fn encode_frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + 2);
    frame.push(SYNC1);
    frame.push(SYNC2);
    frame.push(class);
    frame.push(id);
    frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    frame.extend_from_slice(payload);
    let (ck_a, ck_b) = checksum(&frame[2..]);
    frame.push(ck_a);
    frame.push(ck_b);
    frame
}

/// NAV-PVT poll request (empty payload solicits the current solution)
pub fn nav_pvt_poll() -> Vec<u8> {
    encode_frame(CLASS_NAV, ID_NAV_PVT, &[])
}

/// One complete, checksum-verified UBX frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub class: u8,
    pub id: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn is_nav_pvt(&self) -> bool {
        self.class == CLASS_NAV && self.id == ID_NAV_PVT
    }
}

/// Incremental frame reader over a byte stream
///
/// Receiver output arrives in arbitrary read-sized chunks; this buffers
/// them and yields complete frames. A bad checksum or a bogus length
/// drops the sync pair and rescans, so one corrupted frame never stalls
/// the stream.
pub struct FrameReader {
    buffer: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(2048),
        }
    }

    /// Append freshly read bytes
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Drop garbage before the next sync pair
    fn sync_to_frame_start(&mut self) {
        if let Some(start) = self.buffer.windows(2).position(|pair| pair == [SYNC1, SYNC2]) {
            if start > 0 {
                self.buffer.drain(0..start);
            }
            return;
        }
        // No pair yet. A trailing SYNC1 may be half of one, keep it.
        match self.buffer.last() {
            Some(&SYNC1) => {
                let keep = self.buffer.len() - 1;
                self.buffer.drain(0..keep);
            }
            _ => self.buffer.clear(),
        }
    }

    /// Try to extract the next complete frame
    ///
    /// Returns `Ok(None)` when more bytes are needed. Errors report a
    /// corrupted frame that has been skipped; calling again resumes at
    /// the next sync pair.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.sync_to_frame_start();
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }

        let payload_len = u16::from_le_bytes([self.buffer[4], self.buffer[5]]) as usize;
        if payload_len > MAX_PAYLOAD_LEN {
            self.buffer.drain(0..2);
            return Err(Error::InvalidFrame(format!(
                "payload length {} exceeds {} bytes",
                payload_len, MAX_PAYLOAD_LEN
            )));
        }

        let total_len = HEADER_LEN + payload_len + 2;
        if self.buffer.len() < total_len {
            return Ok(None);
        }

        let (ck_a, ck_b) = checksum(&self.buffer[2..HEADER_LEN + payload_len]);
        let rx_a = self.buffer[HEADER_LEN + payload_len];
        let rx_b = self.buffer[HEADER_LEN + payload_len + 1];
        if (ck_a, ck_b) != (rx_a, rx_b) {
            self.buffer.drain(0..2);
            return Err(Error::ChecksumError {
                expected: ((ck_a as u16) << 8) | ck_b as u16,
                actual: ((rx_a as u16) << 8) | rx_b as u16,
            });
        }

        let frame = Frame {
            class: self.buffer[2],
            id: self.buffer[3],
            payload: self.buffer[HEADER_LEN..HEADER_LEN + payload_len].to_vec(),
        };
        self.buffer.drain(0..total_len);
        Ok(Some(frame))
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parsed UBX-NAV-PVT navigation solution
///
/// Raw integer fields keep the receiver's units (mm, mm/s); angular
/// fields are scaled to degrees on decode.
#[derive(Debug, Clone, PartialEq)]
pub struct NavPvt {
    pub itow_ms: u32,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
    pub valid_date: bool,
    pub valid_time: bool,
    pub fully_resolved: bool,
    pub time_accuracy_ns: u32,
    pub nano_ns: i32,
    pub fix_type: u8,
    pub gnss_fix_ok: bool,
    pub diff_soln: bool,
    pub num_sv: u8,
    pub lon_deg: f64,
    pub lat_deg: f64,
    pub height_mm: i32,
    pub height_msl_mm: i32,
    pub h_acc_mm: u32,
    pub v_acc_mm: u32,
    pub vel_north_mms: i32,
    pub vel_east_mms: i32,
    pub vel_down_mms: i32,
    pub ground_speed_mms: i32,
    pub heading_deg: f64,
    pub speed_acc_mms: u32,
    pub heading_acc_deg: f64,
    pub p_dop: f64,
}

impl NavPvt {
    /// Decode a NAV-PVT payload
    ///
    /// Layout (byte offsets, all values little-endian):
    /// - 0: iTOW u32 ms          4: year u16       6: month, day
    /// - 8: hour, min, sec      11: valid bits    12: tAcc u32 ns
    /// - 16: nano i32           20: fixType       21: flags
    /// - 23: numSV              24: lon i32 1e-7  28: lat i32 1e-7
    /// - 32: height i32 mm      36: hMSL i32 mm   40: hAcc u32 mm
    /// - 44: vAcc u32 mm        48: velN/E/D i32 mm/s
    /// - 60: gSpeed i32 mm/s    64: headMot i32 1e-5 deg
    /// - 68: sAcc u32 mm/s      72: headAcc u32 1e-5 deg
    /// - 76: pDOP u16 0.01
    pub fn decode(payload: &[u8]) -> Result<NavPvt> {
        if payload.len() < NAV_PVT_PAYLOAD_LEN {
            return Err(Error::InvalidFrame(format!(
                "NAV-PVT payload too short: {} bytes",
                payload.len()
            )));
        }

        let valid = payload[11];
        let flags = payload[21];

        Ok(NavPvt {
            itow_ms: read_u32(payload, 0),
            year: read_u16(payload, 4),
            month: payload[6],
            day: payload[7],
            hour: payload[8],
            min: payload[9],
            sec: payload[10],
            valid_date: valid & VALID_DATE != 0,
            valid_time: valid & VALID_TIME != 0,
            fully_resolved: valid & VALID_FULLY_RESOLVED != 0,
            time_accuracy_ns: read_u32(payload, 12),
            nano_ns: read_i32(payload, 16),
            fix_type: payload[20],
            gnss_fix_ok: flags & FLAGS_GNSS_FIX_OK != 0,
            diff_soln: flags & FLAGS_DIFF_SOLN != 0,
            num_sv: payload[23],
            lon_deg: read_i32(payload, 24) as f64 * 1e-7,
            lat_deg: read_i32(payload, 28) as f64 * 1e-7,
            height_mm: read_i32(payload, 32),
            height_msl_mm: read_i32(payload, 36),
            h_acc_mm: read_u32(payload, 40),
            v_acc_mm: read_u32(payload, 44),
            vel_north_mms: read_i32(payload, 48),
            vel_east_mms: read_i32(payload, 52),
            vel_down_mms: read_i32(payload, 56),
            ground_speed_mms: read_i32(payload, 60),
            heading_deg: read_i32(payload, 64) as f64 * 1e-5,
            speed_acc_mms: read_u32(payload, 68),
            heading_acc_deg: read_u32(payload, 72) as f64 * 1e-5,
            p_dop: read_u16(payload, 76) as f64 * 0.01,
        })
    }

    /// Flatten the solution into a reading, keyed by the receiver's
    /// interface field names
    pub fn to_reading(&self) -> Reading {
        let mut reading = Reading::new(Source::Positioning);
        reading.push("iTOW", Value::Int(self.itow_ms as i64));
        reading.push("year", Value::Int(self.year as i64));
        reading.push("month", Value::Int(self.month as i64));
        reading.push("day", Value::Int(self.day as i64));
        reading.push("hour", Value::Int(self.hour as i64));
        reading.push("min", Value::Int(self.min as i64));
        reading.push("sec", Value::Int(self.sec as i64));
        reading.push("validDate", Value::Flag(self.valid_date));
        reading.push("validTime", Value::Flag(self.valid_time));
        reading.push("fullyResolved", Value::Flag(self.fully_resolved));
        reading.push("tAcc", Value::Int(self.time_accuracy_ns as i64));
        reading.push("nano", Value::Int(self.nano_ns as i64));
        reading.push("fixType", Value::Int(self.fix_type as i64));
        reading.push("gnssFixOk", Value::Flag(self.gnss_fix_ok));
        reading.push("diffSoln", Value::Flag(self.diff_soln));
        reading.push("numSV", Value::Int(self.num_sv as i64));
        reading.push("lon", Value::Float(self.lon_deg));
        reading.push("lat", Value::Float(self.lat_deg));
        reading.push("height", Value::Int(self.height_mm as i64));
        reading.push("hMSL", Value::Int(self.height_msl_mm as i64));
        reading.push("hAcc", Value::Int(self.h_acc_mm as i64));
        reading.push("vAcc", Value::Int(self.v_acc_mm as i64));
        reading.push("velN", Value::Int(self.vel_north_mms as i64));
        reading.push("velE", Value::Int(self.vel_east_mms as i64));
        reading.push("velD", Value::Int(self.vel_down_mms as i64));
        reading.push("gSpeed", Value::Int(self.ground_speed_mms as i64));
        reading.push("headMot", Value::Float(self.heading_deg));
        reading.push("sAcc", Value::Int(self.speed_acc_mms as i64));
        reading.push("headAcc", Value::Float(self.heading_acc_deg));
        reading.push("pDOP", Value::Float(self.p_dop));
        reading
    }
}

#[inline]
fn read_u16(payload: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([payload[offset], payload[offset + 1]])
}

#[inline]
fn read_u32(payload: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        payload[offset],
        payload[offset + 1],
        payload[offset + 2],
        payload[offset + 3],
    ])
}

#[inline]
fn read_i32(payload: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        payload[offset],
        payload[offset + 1],
        payload[offset + 2],
        payload[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> Vec<u8> {
        let mut p = vec![0u8; NAV_PVT_PAYLOAD_LEN];
        p[0..4].copy_from_slice(&123456789u32.to_le_bytes());
        p[4..6].copy_from_slice(&2024u16.to_le_bytes());
        p[6] = 6;
        p[7] = 15;
        p[8] = 12;
        p[9] = 34;
        p[10] = 56;
        p[11] = 0x07; // validDate | validTime | fullyResolved
        p[12..16].copy_from_slice(&25u32.to_le_bytes());
        p[16..20].copy_from_slice(&(-500i32).to_le_bytes());
        p[20] = 3; // 3D fix
        p[21] = 0x03; // gnssFixOk | diffSoln
        p[23] = 12;
        p[24..28].copy_from_slice(&211234560i32.to_le_bytes());
        p[28..32].copy_from_slice(&611234560i32.to_le_bytes());
        p[32..36].copy_from_slice(&45000i32.to_le_bytes());
        p[36..40].copy_from_slice(&12345i32.to_le_bytes());
        p[40..44].copy_from_slice(&2500u32.to_le_bytes());
        p[44..48].copy_from_slice(&3100u32.to_le_bytes());
        p[48..52].copy_from_slice(&10i32.to_le_bytes());
        p[52..56].copy_from_slice(&(-20i32).to_le_bytes());
        p[56..60].copy_from_slice(&5i32.to_le_bytes());
        p[60..64].copy_from_slice(&250i32.to_le_bytes());
        p[64..68].copy_from_slice(&1234500i32.to_le_bytes());
        p[68..72].copy_from_slice(&120u32.to_le_bytes());
        p[72..76].copy_from_slice(&540000u32.to_le_bytes());
        p[76..78].copy_from_slice(&150u16.to_le_bytes());
        p
    }

    #[test]
    fn test_nav_pvt_poll_bytes() {
        assert_eq!(
            nav_pvt_poll(),
            vec![0xB5, 0x62, 0x01, 0x07, 0x00, 0x00, 0x08, 0x19]
        );
    }

    #[test]
    fn test_checksum_known_vector() {
        // Poll header: class 01, id 07, len 0000
        assert_eq!(checksum(&[0x01, 0x07, 0x00, 0x00]), (0x08, 0x19));
    }

    #[test]
    fn test_frame_reassembly_across_reads() {
        let frame = encode_frame(CLASS_NAV, ID_NAV_PVT, &sample_payload());
        let mut reader = FrameReader::new();

        let (first, rest) = frame.split_at(10);
        reader.extend(first);
        assert!(reader.next_frame().unwrap().is_none());

        reader.extend(rest);
        let out = reader.next_frame().unwrap().unwrap();
        assert!(out.is_nav_pvt());
        assert_eq!(out.payload, sample_payload());
        // Buffer fully consumed
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_resync_skips_leading_garbage() {
        let mut bytes = vec![0x12, 0x34, 0x56];
        bytes.extend_from_slice(&encode_frame(CLASS_NAV, ID_NAV_PVT, &sample_payload()));

        let mut reader = FrameReader::new();
        reader.extend(&bytes);
        let out = reader.next_frame().unwrap().unwrap();
        assert!(out.is_nav_pvt());
    }

    #[test]
    fn test_checksum_error_then_recovery() {
        let mut corrupted = encode_frame(CLASS_NAV, ID_NAV_PVT, &sample_payload());
        corrupted[10] ^= 0xFF;
        let good = encode_frame(0x05, 0x01, &[0x01, 0x07]);

        let mut reader = FrameReader::new();
        reader.extend(&corrupted);
        reader.extend(&good);

        assert!(matches!(
            reader.next_frame(),
            Err(Error::ChecksumError { .. })
        ));

        // Rescanning lands on the trailing good frame
        let mut recovered = None;
        for _ in 0..32 {
            match reader.next_frame() {
                Ok(Some(frame)) => {
                    recovered = Some(frame);
                    break;
                }
                Ok(None) => break,
                Err(_) => continue,
            }
        }
        let frame = recovered.expect("good frame recovered after corruption");
        assert_eq!((frame.class, frame.id), (0x05, 0x01));
        assert_eq!(frame.payload, vec![0x01, 0x07]);
    }

    #[test]
    fn test_bogus_length_recovers() {
        let mut bytes = vec![SYNC1, SYNC2, 0x01, 0x07, 0xFF, 0xFF];
        bytes.extend_from_slice(&encode_frame(0x05, 0x01, &[]));

        let mut reader = FrameReader::new();
        reader.extend(&bytes);
        assert!(matches!(reader.next_frame(), Err(Error::InvalidFrame(_))));

        let mut recovered = None;
        for _ in 0..32 {
            match reader.next_frame() {
                Ok(Some(frame)) => {
                    recovered = Some(frame);
                    break;
                }
                Ok(None) => break,
                Err(_) => continue,
            }
        }
        let frame = recovered.expect("good frame recovered after bogus length");
        assert_eq!((frame.class, frame.id), (0x05, 0x01));
    }

    #[test]
    fn test_decode_nav_pvt() {
        let pvt = NavPvt::decode(&sample_payload()).unwrap();
        assert_eq!(pvt.itow_ms, 123456789);
        assert_eq!(pvt.year, 2024);
        assert_eq!(pvt.month, 6);
        assert_eq!(pvt.day, 15);
        assert_eq!(pvt.hour, 12);
        assert_eq!(pvt.min, 34);
        assert_eq!(pvt.sec, 56);
        assert!(pvt.valid_date);
        assert!(pvt.valid_time);
        assert!(pvt.fully_resolved);
        assert_eq!(pvt.time_accuracy_ns, 25);
        assert_eq!(pvt.nano_ns, -500);
        assert_eq!(pvt.fix_type, 3);
        assert!(pvt.gnss_fix_ok);
        assert!(pvt.diff_soln);
        assert_eq!(pvt.num_sv, 12);
        assert!((pvt.lon_deg - 21.123456).abs() < 1e-9);
        assert!((pvt.lat_deg - 61.123456).abs() < 1e-9);
        assert_eq!(pvt.height_mm, 45000);
        assert_eq!(pvt.height_msl_mm, 12345);
        assert_eq!(pvt.h_acc_mm, 2500);
        assert_eq!(pvt.v_acc_mm, 3100);
        assert_eq!(pvt.vel_north_mms, 10);
        assert_eq!(pvt.vel_east_mms, -20);
        assert_eq!(pvt.vel_down_mms, 5);
        assert_eq!(pvt.ground_speed_mms, 250);
        assert!((pvt.heading_deg - 12.345).abs() < 1e-9);
        assert_eq!(pvt.speed_acc_mms, 120);
        assert!((pvt.heading_acc_deg - 5.4).abs() < 1e-9);
        assert!((pvt.p_dop - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_decode_rejects_short_payload() {
        assert!(NavPvt::decode(&[0u8; 20]).is_err());
    }

    #[test]
    fn test_reading_keeps_interface_names() {
        let reading = NavPvt::decode(&sample_payload()).unwrap().to_reading();
        assert_eq!(reading.len(), 30);
        assert!(matches!(reading.get("lat"), Some(Value::Float(_))));
        assert!(matches!(reading.get("numSV"), Some(Value::Int(12))));
        assert!(matches!(reading.get("gnssFixOk"), Some(Value::Flag(true))));
        assert!(matches!(reading.get("pDOP"), Some(Value::Float(_))));
    }
}
