//! Hardware constraints for unit placement.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::ConstraintError;

/// Describes a user's requirements of the hardware on which units of a
/// service will run. Constraints are used to choose an existing machine onto
/// which a unit will be deployed, or to provision a new machine if no
/// existing one satisfies the requirements.
///
/// Absent fields place no requirement; a present zero value is an explicit
/// clear and renders as `name=` with no value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    /// Required machine architecture, one of `amd64`, `i386` or `arm`.
    /// Empty means "cleared".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,

    /// Minimum number of effective cores.
    #[serde(rename = "cpu-cores", default, skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<u64>,

    /// Minimum CPU power, where 100 units is roughly one 2007-era Xeon core.
    #[serde(rename = "cpu-power", default, skip_serializing_if = "Option::is_none")]
    pub cpu_power: Option<u64>,

    /// Minimum memory in megabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem: Option<u64>,
}

const MEM_SUFFIXES: [(char, f64); 4] = [
    ('M', 1.0),
    ('G', 1024.0),
    ('T', 1024.0 * 1024.0),
    ('P', 1024.0 * 1024.0 * 1024.0),
];

impl Constraints {
    /// Constructs a `Constraints` from the supplied arguments, each of which
    /// must contain only spaces and `name=value` pairs. If any name is
    /// specified more than once, an error is returned.
    pub fn parse(args: &[&str]) -> Result<Self, ConstraintError> {
        let mut cons = Constraints::default();
        for arg in args {
            for raw in arg.split_whitespace() {
                cons.set_raw(raw)?;
            }
        }
        Ok(cons)
    }

    /// Interprets a single `name=value` token and sets the named constraint.
    fn set_raw(
        &mut self,
        raw: &str,
    ) -> Result<(), ConstraintError> {
        let eq = match raw.find('=') {
            Some(i) if i > 0 => i,
            _ => return Err(ConstraintError::Malformed(raw.to_string())),
        };
        let (name, value) = (&raw[..eq], &raw[eq + 1..]);
        let result = match name {
            "arch" => self.set_arch(value),
            "cpu-cores" => set_uint(&mut self.cpu_cores, value),
            "cpu-power" => set_uint(&mut self.cpu_power, value),
            "mem" => self.set_mem(value),
            _ => return Err(ConstraintError::Unknown(name.to_string())),
        };
        result.map_err(|reason| ConstraintError::bad(name, reason))
    }

    fn set_arch(
        &mut self,
        value: &str,
    ) -> Result<(), String> {
        if self.arch.is_some() {
            return Err("already set".to_string());
        }
        match value {
            "" | "amd64" | "i386" | "arm" => {}
            _ => return Err(format!("{value:?} not recognized")),
        }
        self.arch = Some(value.to_string());
        Ok(())
    }

    fn set_mem(
        &mut self,
        value: &str,
    ) -> Result<(), String> {
        if self.mem.is_some() {
            return Err("already set".to_string());
        }
        let mut mem = 0;
        if !value.is_empty() {
            let mut digits = value;
            let mut mult = 1.0;
            if let Some(&(_, m)) = MEM_SUFFIXES
                .iter()
                .find(|(suffix, _)| value.ends_with(*suffix))
            {
                digits = &value[..value.len() - 1];
                mult = m;
            }
            let parsed = digits.parse::<f64>();
            match parsed {
                Ok(val) if val >= 0.0 => mem = (val * mult).ceil() as u64,
                _ => {
                    return Err(
                        "must be a non-negative float with optional M/G/T/P suffix".to_string()
                    )
                }
            }
        }
        self.mem = Some(mem);
        Ok(())
    }
}

fn set_uint(
    slot: &mut Option<u64>,
    value: &str,
) -> Result<(), String> {
    if slot.is_some() {
        return Err("already set".to_string());
    }
    let parsed = if value.is_empty() {
        0
    } else {
        value
            .parse::<u64>()
            .map_err(|_| "must be a non-negative integer".to_string())?
    };
    *slot = Some(parsed);
    Ok(())
}

fn uint_str(value: u64) -> String {
    if value == 0 {
        String::new()
    } else {
        value.to_string()
    }
}

/// Renders the constraints in the language they were specified in, with
/// names in canonical order: arch, cpu-cores, cpu-power, mem.
impl fmt::Display for Constraints {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(arch) = &self.arch {
            parts.push(format!("arch={arch}"));
        }
        if let Some(cores) = self.cpu_cores {
            parts.push(format!("cpu-cores={}", uint_str(cores)));
        }
        if let Some(power) = self.cpu_power {
            parts.push(format!("cpu-power={}", uint_str(power)));
        }
        if let Some(mem) = self.mem {
            let mut value = uint_str(mem);
            if !value.is_empty() {
                value.push('M');
            }
            parts.push(format!("mem={value}"));
        }
        f.write_str(&parts.join(" "))
    }
}

impl FromStr for Constraints {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Constraints::parse(&[s])
    }
}
