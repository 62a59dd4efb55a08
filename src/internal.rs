//! The built-in `internal` sampling method.
//!
//! Dispatches on the first key segment. Only `cpu.*` is implemented.

use std::sync::Mutex;

use sysinfo::System;

use crate::{
    codec::{encode_float, encode_int},
    error::{Error, Result},
    key::SEPARATOR,
    registry::SamplingMethod,
};

#[derive(Debug)]
pub struct InternalMethod {
    cpu: Mutex<CpuSampler>,
}
impl InternalMethod {
    pub fn new() -> Self {
        Self {
            cpu: Mutex::new(CpuSampler::new()),
        }
    }
}
impl Default for InternalMethod {
    fn default() -> Self {
        Self::new()
    }
}
impl SamplingMethod for InternalMethod {
    fn sample(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        let group = key.split(SEPARATOR).next().unwrap_or_default();
        match group {
            "cpu" => {
                let mut cpu = self.cpu.lock().unwrap_or_else(|e| e.into_inner());
                cpu.by_key(key)
            }
            _ => Err(unknown_key(key)),
        }
    }
}

/// CPU usage is measured between two refreshes, so the first
/// `cpu.percent*` sample after start reads as zero.
#[derive(Debug)]
struct CpuSampler {
    sys: System,
}
impl CpuSampler {
    fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        Self { sys }
    }

    fn by_key(&mut self, key: &str) -> Result<Vec<Vec<u8>>> {
        match key {
            "cpu.cores" => {
                let cores = self.sys.physical_core_count().ok_or_else(|| Error::SamplerFailed {
                    key: key.to_string(),
                    reason: "physical core count unavailable".into(),
                })?;
                Ok(vec![encode_count(cores)?])
            }
            "cpu.threads" => Ok(vec![encode_count(self.sys.cpus().len())?]),
            "cpu.percent" => {
                self.sys.refresh_cpu_usage();
                let usage = f64::from(self.sys.global_cpu_usage());
                Ok(vec![encode_float(usage).to_vec()])
            }
            "cpu.percent.thread" => {
                self.sys.refresh_cpu_usage();
                Ok(self
                    .sys
                    .cpus()
                    .iter()
                    .map(|cpu| encode_float(f64::from(cpu.cpu_usage())).to_vec())
                    .collect())
            }
            _ => Err(unknown_key(key)),
        }
    }
}

fn encode_count(n: usize) -> Result<Vec<u8>> {
    let n = i64::try_from(n).map_err(|_| Error::IntegerOutOfRange { value: n as i128 })?;
    Ok(encode_int(n)?.to_vec())
}

fn unknown_key(key: &str) -> Error {
    Error::UnknownKey {
        key: key.to_string(),
    }
}
