pub mod probe;

use std::fmt;

use serde::Serialize;

use crate::errors::{QcError, Result};

/// Number of quality values tracked per position (0..=41).
pub const QUALITY_LEVELS: usize = 42;

/// ASCII encodings of per-base quality seen in FASTQ files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualitySystem {
    Sanger = 0,
    Solexa = 1,
    Illumina13 = 2,
    Illumina15 = 3,
    Illumina18 = 4,
}

impl QualitySystem {
    pub const ALL: [QualitySystem; 5] = [
        QualitySystem::Sanger,
        QualitySystem::Solexa,
        QualitySystem::Illumina13,
        QualitySystem::Illumina15,
        QualitySystem::Illumina18,
    ];

    pub fn from_id(id: u8) -> Result<Self> {
        Self::ALL.get(id as usize).copied().ok_or(QcError::InvalidQualitySystem(id))
    }

    /// Character that encodes quality value zero.
    pub fn zero_quality(self) -> u8 {
        match self {
            QualitySystem::Sanger | QualitySystem::Illumina18 => b'!',
            QualitySystem::Solexa | QualitySystem::Illumina13 | QualitySystem::Illumina15 => b'@',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QualitySystem::Sanger => "Sanger",
            QualitySystem::Solexa => "Solexa",
            QualitySystem::Illumina13 => "Illumina 1.3+",
            QualitySystem::Illumina15 => "Illumina 1.5+",
            QualitySystem::Illumina18 => "Illumina 1.8+",
        }
    }
}

impl fmt::Display for QualitySystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lowest character the Illumina 1.3+ alphabet may emit after conversion.
const ILLUMINA13_FLOOR: u8 = b'B';

/// Re-encodes a quality string from one system to another, in place.
///
/// Every code is shifted by the difference between the two zero characters and
/// clamped at the destination floor. Converting to Illumina 1.3+ additionally
/// clamps at `'B'`, so a round trip through that system is lossy at the bottom
/// of the scale.
pub fn convert(qual: &mut [u8], from: QualitySystem, to: QualitySystem) {
    if from == to {
        return;
    }
    let diff = to.zero_quality() as i16 - from.zero_quality() as i16;
    let mut floor = to.zero_quality() as i16;
    if to == QualitySystem::Illumina13 {
        floor = floor.max(ILLUMINA13_FLOOR as i16);
    }
    for c in qual.iter_mut() {
        let shifted = (*c as i16 + diff).max(floor).min(u8::MAX as i16);
        *c = shifted as u8;
    }
}

/// Quality value of a single code, clamped into the histogram range.
#[inline]
pub fn quality_value(code: u8, system: QualitySystem) -> usize {
    let q = code as i16 - system.zero_quality() as i16;
    q.clamp(0, QUALITY_LEVELS as i16 - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_quality_table() {
        let zeros: Vec<u8> = QualitySystem::ALL.iter().map(|s| s.zero_quality()).collect();
        assert_eq!(zeros, b"!@@@!".to_vec());
    }

    #[test]
    fn test_from_id_rejects_unknown() {
        assert_eq!(QualitySystem::from_id(3).unwrap(), QualitySystem::Illumina15);
        assert!(matches!(QualitySystem::from_id(5), Err(QcError::InvalidQualitySystem(5))));
    }

    #[test]
    fn test_convert_identity() {
        for sys in QualitySystem::ALL {
            let mut q = b"!#5?IJh".to_vec();
            convert(&mut q, sys, sys);
            assert_eq!(q, b"!#5?IJh".to_vec());
        }
    }

    #[test]
    fn test_convert_sanger_to_illumina15_and_back() {
        let mut q = b"!+5I".to_vec();
        convert(&mut q, QualitySystem::Sanger, QualitySystem::Illumina15);
        assert_eq!(q, b"@JTh".to_vec());
        convert(&mut q, QualitySystem::Illumina15, QualitySystem::Sanger);
        assert_eq!(q, b"!+5I".to_vec());
    }

    #[test]
    fn test_convert_floor_clamp_is_lossy_through_illumina13() {
        let mut q = b"!".to_vec();
        convert(&mut q, QualitySystem::Sanger, QualitySystem::Illumina13);
        assert_eq!(q, b"B".to_vec());
        convert(&mut q, QualitySystem::Illumina13, QualitySystem::Sanger);
        assert_eq!(q, b"#".to_vec());
    }

    #[test]
    fn test_convert_clamps_below_destination_zero() {
        // Solexa allows codes below '@'; they clamp to the Sanger floor.
        let mut q = b";@".to_vec();
        convert(&mut q, QualitySystem::Solexa, QualitySystem::Illumina18);
        assert_eq!(q, b"!!".to_vec());
    }

    #[test]
    fn test_quality_value_clamps() {
        assert_eq!(quality_value(b'!', QualitySystem::Sanger), 0);
        assert_eq!(quality_value(b'I', QualitySystem::Sanger), 40);
        assert_eq!(quality_value(b'~', QualitySystem::Sanger), 41);
        assert_eq!(quality_value(b';', QualitySystem::Solexa), 0);
    }
}
