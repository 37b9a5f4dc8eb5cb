//! Minimal TDMS writer for fixtures
//!
//! Produces one little-endian segment holding a single group with a
//! single float64 channel and a `SampleRate` property.

use std::path::Path;

const TOC_META_DATA: u32 = 1 << 1;
const TOC_NEW_OBJ_LIST: u32 = 1 << 2;
const TOC_RAW_DATA: u32 = 1 << 3;
const VERSION: u32 = 4713;
const NO_RAW_DATA: u32 = 0xFFFF_FFFF;
const TYPE_F64: u32 = 0x0A;
const TYPE_STRING: u32 = 0x20;

fn put_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Encode `samples` as channel `channel` in group `group`
pub fn tdms_f64_bytes(group: &str, channel: &str, samples: &[f64], sample_rate: f64) -> Vec<u8> {
    let mut meta = Vec::new();
    meta.extend_from_slice(&3u32.to_le_bytes());

    // Root object with a title property
    put_string(&mut meta, "/");
    meta.extend_from_slice(&NO_RAW_DATA.to_le_bytes());
    meta.extend_from_slice(&1u32.to_le_bytes());
    put_string(&mut meta, "name");
    meta.extend_from_slice(&TYPE_STRING.to_le_bytes());
    put_string(&mut meta, "fixture");

    put_string(&mut meta, &format!("/'{}'", group));
    meta.extend_from_slice(&NO_RAW_DATA.to_le_bytes());
    meta.extend_from_slice(&0u32.to_le_bytes());

    put_string(&mut meta, &format!("/'{}'/'{}'", group, channel));
    meta.extend_from_slice(&20u32.to_le_bytes());
    meta.extend_from_slice(&TYPE_F64.to_le_bytes());
    meta.extend_from_slice(&1u32.to_le_bytes());
    meta.extend_from_slice(&(samples.len() as u64).to_le_bytes());
    meta.extend_from_slice(&1u32.to_le_bytes());
    put_string(&mut meta, "SampleRate");
    meta.extend_from_slice(&TYPE_F64.to_le_bytes());
    meta.extend_from_slice(&sample_rate.to_le_bytes());

    let raw: Vec<u8> = samples.iter().flat_map(|v| v.to_le_bytes()).collect();

    let mut out = Vec::with_capacity(28 + meta.len() + raw.len());
    out.extend_from_slice(b"TDSm");
    out.extend_from_slice(&(TOC_META_DATA | TOC_NEW_OBJ_LIST | TOC_RAW_DATA).to_le_bytes());
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&((meta.len() + raw.len()) as u64).to_le_bytes());
    out.extend_from_slice(&(meta.len() as u64).to_le_bytes());
    out.extend(meta);
    out.extend(raw);
    out
}

pub fn write_tdms_f64(path: &Path, samples: &[f64], sample_rate: u32) -> anyhow::Result<()> {
    std::fs::write(
        path,
        tdms_f64_bytes("Measurement", "Mic", samples, sample_rate as f64),
    )?;
    Ok(())
}
