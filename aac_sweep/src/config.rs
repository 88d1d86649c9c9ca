//! Encoder configuration model
//!
//! A [`Configuration`] is the set of encoder options for one trial. Options
//! that are `None` are left to the encoder's defaults, which is exactly what
//! several sweep branches want to observe.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatId {
    /// MPEG-4 AAC (LC)
    Aac,
}

impl FormatId {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatId::Aac => "aac",
        }
    }
}

/// Output container, chosen by file extension.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
pub enum Container {
    Caf,
    M4a,
}

impl Container {
    pub const ALL: [Container; 2] = [Container::Caf, Container::M4a];

    pub fn extension(&self) -> &'static str {
        match self {
            Container::Caf => "caf",
            Container::M4a => "m4a",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "caf" => Some(Container::Caf),
            "m4a" => Some(Container::M4a),
            _ => None,
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How the encoder controls its output bit rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitRateStrategy {
    Constant,
    LongTermAverage,
    VariableConstrained,
    Variable,
}

impl BitRateStrategy {
    /// Sweep order.
    pub const ALL: [BitRateStrategy; 4] = [
        BitRateStrategy::Constant,
        BitRateStrategy::LongTermAverage,
        BitRateStrategy::VariableConstrained,
        BitRateStrategy::Variable,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BitRateStrategy::Constant => "Constant",
            BitRateStrategy::LongTermAverage => "LongTermAverage",
            BitRateStrategy::VariableConstrained => "VariableConstrained",
            BitRateStrategy::Variable => "Variable",
        }
    }

    /// Whether a VBR-quality key may be combined with this strategy.
    ///
    /// AudioToolbox aborts the whole process (no error is returned, nothing
    /// can be caught) when `Variable` is combined with a VBR quality, so that
    /// pairing is never generated.
    pub fn accepts_vbr_quality(&self) -> bool {
        !matches!(self, BitRateStrategy::Variable)
    }
}

impl fmt::Display for BitRateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encoder quality hint; raw values follow AudioToolbox's 0..=127 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AudioQuality {
    Min,
    Low,
    Medium,
    High,
    Max,
}

impl AudioQuality {
    pub const ALL: [AudioQuality; 5] = [
        AudioQuality::Min,
        AudioQuality::Low,
        AudioQuality::Medium,
        AudioQuality::High,
        AudioQuality::Max,
    ];

    pub fn raw_value(&self) -> u8 {
        match self {
            AudioQuality::Min => 0,
            AudioQuality::Low => 0x20,
            AudioQuality::Medium => 0x40,
            AudioQuality::High => 0x60,
            AudioQuality::Max => 0x7F,
        }
    }
}

/// Requested bit rate, either for the whole stream or per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitRate {
    Total(u32),
    PerChannel(u32),
}

impl BitRate {
    /// Bit rate for the whole stream with `channels` channels.
    pub fn total_for(&self, channels: u16) -> u64 {
        match self {
            BitRate::Total(v) => u64::from(*v),
            BitRate::PerChannel(v) => u64::from(*v) * u64::from(channels),
        }
    }
}

/// Field names used in flat trial records.
pub mod field {
    pub const SAMPLE_RATE: &str = "SampleRate";
    pub const NUMBER_OF_CHANNELS: &str = "NumberOfChannels";
    pub const STRATEGY: &str = "Strategy";
    pub const BIT_RATE: &str = "BitRate";
    pub const BIT_RATE_PER_CHANNEL: &str = "BitRatePerChannel";
    pub const QUALITY: &str = "Quality";
    pub const VBR_QUALITY: &str = "VBRQuality";
    pub const MEASURED_BIT_RATE: &str = "MeasuredBitRate";
    pub const CONVERSION_TIME_NS: &str = "ConversionTimeNanoSeconds";
    pub const CHECKSUM: &str = "Checksum";
    pub const REFERENCE_CHECKSUM: &str = "ReferenceChecksum";
    pub const FILE_FORMAT: &str = "FileFormat";
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    pub format: FormatId,
    pub sample_rate: u32,
    pub channels: u16,
    pub strategy: Option<BitRateStrategy>,
    pub quality: Option<AudioQuality>,
    pub vbr_quality: Option<AudioQuality>,
    pub bit_rate: Option<BitRate>,
}

impl Configuration {
    /// AAC at the source's sample rate and channel count, everything else default.
    pub fn aac(sample_rate: u32, channels: u16) -> Self {
        Self {
            format: FormatId::Aac,
            sample_rate,
            channels,
            strategy: None,
            quality: None,
            vbr_quality: None,
            bit_rate: None,
        }
    }

    pub fn with_strategy(mut self, strategy: BitRateStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_quality(mut self, quality: AudioQuality) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_vbr_quality(mut self, quality: AudioQuality) -> Self {
        self.vbr_quality = Some(quality);
        self
    }

    pub fn with_bit_rate(mut self, bit_rate: BitRate) -> Self {
        self.bit_rate = Some(bit_rate);
        self
    }

    /// The one combination the native encoder cannot survive.
    pub fn is_excluded(&self) -> bool {
        self.vbr_quality.is_some()
            && self
                .strategy
                .map(|s| !s.accepts_vbr_quality())
                .unwrap_or(false)
    }

    /// Flat `name -> value` view of the options that are set.
    pub fn fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert(field::SAMPLE_RATE.to_string(), self.sample_rate.to_string());
        fields.insert(field::NUMBER_OF_CHANNELS.to_string(), self.channels.to_string());
        if let Some(strategy) = self.strategy {
            fields.insert(field::STRATEGY.to_string(), strategy.name().to_string());
        }
        match self.bit_rate {
            Some(BitRate::Total(v)) => {
                fields.insert(field::BIT_RATE.to_string(), v.to_string());
            }
            Some(BitRate::PerChannel(v)) => {
                fields.insert(field::BIT_RATE_PER_CHANNEL.to_string(), v.to_string());
            }
            None => {}
        }
        if let Some(q) = self.quality {
            fields.insert(field::QUALITY.to_string(), q.raw_value().to_string());
        }
        if let Some(q) = self.vbr_quality {
            fields.insert(field::VBR_QUALITY.to_string(), q.raw_value().to_string());
        }
        fields
    }

    /// File-name tag, e.g. `Constant_BR128000_Q96`.
    pub fn file_tag(&self) -> String {
        let mut tag = self
            .strategy
            .map(|s| s.name().to_string())
            .unwrap_or_else(|| "Default".to_string());
        match self.bit_rate {
            Some(BitRate::Total(v)) => tag.push_str(&format!("_BR{}", v)),
            Some(BitRate::PerChannel(v)) => tag.push_str(&format!("_BRPC{}", v)),
            None => {}
        }
        if let Some(q) = self.quality {
            tag.push_str(&format!("_Q{}", q.raw_value()));
        }
        if let Some(q) = self.vbr_quality {
            tag.push_str(&format!("_VBRQ{}", q.raw_value()));
        }
        tag
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}Hz {}ch",
            self.format.as_str(),
            self.sample_rate,
            self.channels
        )?;
        if let Some(strategy) = self.strategy {
            write!(f, " strategy={}", strategy)?;
        }
        match self.bit_rate {
            Some(BitRate::Total(v)) => write!(f, " bit_rate={}", v)?,
            Some(BitRate::PerChannel(v)) => write!(f, " bit_rate_per_channel={}", v)?,
            None => {}
        }
        if let Some(q) = self.quality {
            write!(f, " quality={}", q.raw_value())?;
        }
        if let Some(q) = self.vbr_quality {
            write!(f, " vbr_quality={}", q.raw_value())?;
        }
        Ok(())
    }
}
