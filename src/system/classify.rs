//! Capability classification
//!
//! Maps a [`HardwareProfile`] onto one of six ordered performance tiers,
//! the render-quality preset bound to that tier, and a precision
//! recommendation. Every table is an exhaustive `match`, so there is no
//! unclassifiable input.

use super::{GpuVendorClass, HardwareProfile};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Ordered performance tier
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum PerformanceTier {
    /// Barely interactive hardware
    VeryLow,
    /// Weak integrated graphics
    Low,
    /// Reduced effects, moderate frame rate
    Lite,
    /// Baseline experience
    #[default]
    Standard,
    /// Capable discrete GPU
    High,
    /// Top end
    Ultra,
}

impl PerformanceTier {
    /// All tiers, lowest first
    pub const ALL: [PerformanceTier; 6] = [
        PerformanceTier::VeryLow,
        PerformanceTier::Low,
        PerformanceTier::Lite,
        PerformanceTier::Standard,
        PerformanceTier::High,
        PerformanceTier::Ultra,
    ];

    /// Position in [`Self::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Next tier down, `None` at the floor
    pub fn step_down(&self) -> Option<Self> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    /// Next tier up, `None` at the ceiling
    pub fn step_up(&self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// Stable name, matches the serialized form
    pub fn name(&self) -> &'static str {
        match self {
            PerformanceTier::VeryLow => "very-low",
            PerformanceTier::Low => "low",
            PerformanceTier::Lite => "lite",
            PerformanceTier::Standard => "standard",
            PerformanceTier::High => "high",
            PerformanceTier::Ultra => "ultra",
        }
    }

    /// Render-quality preset bound to this tier
    pub fn render_quality(&self) -> RenderQuality {
        use AntialiasingMode as Aa;
        use Effect::*;
        use ResolutionTag as Res;

        let (frame_rate_target, resolution, effects, antialiasing) = match self {
            PerformanceTier::VeryLow => (24, Res::P540, vec![], Aa::None),
            PerformanceTier::Low => (30, Res::P720, vec![Shadows], Aa::Fxaa),
            PerformanceTier::Lite => (45, Res::P720, vec![Shadows, Bloom], Aa::Fxaa),
            PerformanceTier::Standard => (
                60,
                Res::P1080,
                vec![Shadows, Bloom, AmbientOcclusion],
                Aa::Msaa2x,
            ),
            PerformanceTier::High => (
                60,
                Res::P1440,
                vec![Shadows, Bloom, AmbientOcclusion, DepthOfField],
                Aa::Msaa4x,
            ),
            PerformanceTier::Ultra => (
                120,
                Res::P2160,
                vec![Shadows, Bloom, AmbientOcclusion, DepthOfField, MotionBlur],
                Aa::Msaa8x,
            ),
        };

        RenderQuality {
            frame_rate_target,
            resolution,
            effects,
            antialiasing,
        }
    }

    /// Surface settings applied when entering this tier
    pub fn preset(&self) -> TierPreset {
        let quality = self.render_quality();
        let resolution_scale = match self {
            PerformanceTier::VeryLow => 0.5,
            PerformanceTier::Low => 0.75,
            PerformanceTier::Lite => 0.85,
            PerformanceTier::Standard => 1.0,
            PerformanceTier::High => 1.25,
            PerformanceTier::Ultra => 1.5,
        };
        TierPreset {
            target_fps: quality.frame_rate_target,
            resolution_scale,
            effects_level: quality.effects.len().min(4) as u8,
        }
    }

    /// Render complexity mode derived from this tier
    pub fn render_complexity(&self) -> RenderComplexityMode {
        match self {
            PerformanceTier::High | PerformanceTier::Ultra => RenderComplexityMode::Pseudo3d,
            PerformanceTier::Standard | PerformanceTier::Lite => RenderComplexityMode::Parallax,
            PerformanceTier::Low | PerformanceTier::VeryLow => RenderComplexityMode::Flat,
        }
    }

    /// Recommended precision level (0-4), monotone in tier
    pub fn precision_recommendation(&self) -> u8 {
        match self {
            PerformanceTier::VeryLow => 0,
            PerformanceTier::Low => 1,
            PerformanceTier::Lite => 2,
            PerformanceTier::Standard => 3,
            PerformanceTier::High | PerformanceTier::Ultra => 4,
        }
    }
}

impl std::fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Output resolution class, ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResolutionTag {
    /// 960x540
    #[serde(rename = "540p")]
    P540,
    /// 1280x720
    #[serde(rename = "720p")]
    P720,
    /// 1920x1080
    #[serde(rename = "1080p")]
    P1080,
    /// 2560x1440
    #[serde(rename = "1440p")]
    P1440,
    /// 3840x2160
    #[serde(rename = "2160p")]
    P2160,
}

/// Post-processing effect, listed in enable order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Effect {
    /// Dynamic shadows
    Shadows,
    /// Bloom glow
    Bloom,
    /// Screen-space ambient occlusion
    AmbientOcclusion,
    /// Depth of field blur
    DepthOfField,
    /// Motion blur
    MotionBlur,
}

/// Antialiasing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntialiasingMode {
    /// Off
    None,
    /// Post-process FXAA
    Fxaa,
    /// 2x multisampling
    Msaa2x,
    /// 4x multisampling
    Msaa4x,
    /// 8x multisampling
    Msaa8x,
}

/// Render complexity mode, a secondary setting derived from the tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderComplexityMode {
    /// Static sprites
    #[default]
    Flat,
    /// Layered parallax
    Parallax,
    /// Faux depth
    Pseudo3d,
}

/// Render-quality preset bound to a tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderQuality {
    /// Frames per second to aim for
    pub frame_rate_target: u32,
    /// Output resolution class
    pub resolution: ResolutionTag,
    /// Enabled effects, in order
    pub effects: Vec<Effect>,
    /// Antialiasing mode
    pub antialiasing: AntialiasingMode,
}

/// Numeric surface settings for a tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierPreset {
    /// Target frame rate
    pub target_fps: u32,
    /// Render resolution multiplier
    pub resolution_scale: f64,
    /// Effects level 0-4
    pub effects_level: u8,
}

/// Memory bucket used as the second classification key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MemoryBucket {
    /// Less than 4 GB
    Under4,
    /// 4 to under 8 GB
    From4To8,
    /// 8 to under 16 GB
    From8To16,
    /// 16 to under 32 GB
    From16To32,
    /// 32 GB or more
    Over32,
}

impl MemoryBucket {
    /// Bucket a memory size; non-finite or negative sizes land in the lowest bucket
    pub fn from_gb(memory_gb: f64) -> Self {
        if !memory_gb.is_finite() || memory_gb < 4.0 {
            MemoryBucket::Under4
        } else if memory_gb < 8.0 {
            MemoryBucket::From4To8
        } else if memory_gb < 16.0 {
            MemoryBucket::From8To16
        } else if memory_gb < 32.0 {
            MemoryBucket::From16To32
        } else {
            MemoryBucket::Over32
        }
    }
}

/// One-time tuning recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityAssessment {
    /// Performance tier
    pub performance_tier: PerformanceTier,
    /// Preset for that tier
    pub render_quality: RenderQuality,
    /// Precision level 0-4
    pub precision_recommendation: u8,
}

impl CapabilityAssessment {
    /// Assessment for a given tier
    pub fn for_tier(tier: PerformanceTier) -> Self {
        Self {
            performance_tier: tier,
            render_quality: tier.render_quality(),
            precision_recommendation: tier.precision_recommendation(),
        }
    }

    /// Print assessment to console
    pub fn print_summary(&self) {
        println!("=== Capability Assessment ===\n");
        println!("  Tier:            {}", self.performance_tier);
        println!("  Frame target:    {} fps", self.render_quality.frame_rate_target);
        println!("  Resolution:      {:?}", self.render_quality.resolution);
        println!("  Effects:         {:?}", self.render_quality.effects);
        println!("  Antialiasing:    {:?}", self.render_quality.antialiasing);
        println!("  Precision level: {}", self.precision_recommendation);
    }
}

/// Pure hardware to tier classifier
#[derive(Debug, Default, Clone, Copy)]
pub struct CapabilityClassifier;

impl CapabilityClassifier {
    /// Classify a profile
    pub fn classify(profile: &HardwareProfile) -> CapabilityAssessment {
        let bucket = MemoryBucket::from_gb(profile.memory_gb);
        CapabilityAssessment::for_tier(Self::tier_for(profile.gpu_vendor, bucket))
    }

    /// Classify, falling back to `standard` when no profile is available
    pub fn classify_or_default(profile: Option<&HardwareProfile>) -> CapabilityAssessment {
        match profile {
            Some(profile) => Self::classify(profile),
            None => CapabilityAssessment::for_tier(PerformanceTier::Standard),
        }
    }

    /// Tier table keyed on (vendor, memory bucket)
    pub fn tier_for(vendor: GpuVendorClass, bucket: MemoryBucket) -> PerformanceTier {
        use GpuVendorClass as V;
        use MemoryBucket as M;
        use PerformanceTier as T;

        match (vendor, bucket) {
            (_, M::Under4) => T::VeryLow,

            (V::Nvidia, M::From4To8) => T::Lite,
            (V::Nvidia, M::From8To16) => T::Standard,
            (V::Nvidia, M::From16To32) => T::High,
            (V::Nvidia, M::Over32) => T::Ultra,

            (V::Apple, M::From4To8) => T::Lite,
            (V::Apple, M::From8To16) => T::Standard,
            (V::Apple, M::From16To32) => T::High,
            (V::Apple, M::Over32) => T::High,

            (V::Amd | V::Intel, M::From4To8) => T::Low,
            (V::Amd | V::Intel, M::From8To16) => T::Lite,
            (V::Amd | V::Intel, M::From16To32) => T::Standard,
            (V::Amd | V::Intel, M::Over32) => T::Standard,

            (V::Unknown, M::From4To8) => T::Lite,
            (V::Unknown, M::From8To16) => T::Lite,
            (V::Unknown, M::From16To32) => T::Standard,
            (V::Unknown, M::Over32) => T::Standard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn profile(memory_gb: f64, gpu_vendor: GpuVendorClass) -> HardwareProfile {
        HardwareProfile {
            memory_gb,
            gpu_vendor,
            ..Default::default()
        }
    }

    #[test]
    fn test_low_memory_is_very_low_for_any_gpu() {
        for vendor in [
            GpuVendorClass::Nvidia,
            GpuVendorClass::Amd,
            GpuVendorClass::Intel,
            GpuVendorClass::Apple,
            GpuVendorClass::Unknown,
        ] {
            assert_eq!(
                CapabilityClassifier::classify(&profile(3.5, vendor)).performance_tier,
                PerformanceTier::VeryLow
            );
        }
    }

    #[test]
    fn test_table_examples() {
        let tier = |m, v| CapabilityClassifier::classify(&profile(m, v)).performance_tier;
        assert_eq!(tier(32.0, GpuVendorClass::Nvidia), PerformanceTier::Ultra);
        assert_eq!(tier(16.0, GpuVendorClass::Intel), PerformanceTier::Standard);
        assert_eq!(tier(16.0, GpuVendorClass::Amd), PerformanceTier::Standard);
        assert_eq!(tier(6.0, GpuVendorClass::Unknown), PerformanceTier::Lite);
        assert_eq!(tier(4.0, GpuVendorClass::Unknown), PerformanceTier::Lite);
    }

    #[test]
    fn test_missing_profile_falls_back_to_standard() {
        let assessment = CapabilityClassifier::classify_or_default(None);
        assert_eq!(assessment.performance_tier, PerformanceTier::Standard);
        assert_eq!(assessment.render_quality.frame_rate_target, 60);
    }

    #[test]
    fn test_default_profile_is_usable() {
        let assessment = CapabilityClassifier::classify(&HardwareProfile::default());
        assert_eq!(assessment.performance_tier, PerformanceTier::Lite);
    }

    #[test]
    fn test_tier_ordering_and_steps() {
        assert!(PerformanceTier::VeryLow < PerformanceTier::Low);
        assert!(PerformanceTier::High < PerformanceTier::Ultra);
        assert_eq!(PerformanceTier::VeryLow.step_down(), None);
        assert_eq!(PerformanceTier::Ultra.step_up(), None);
        assert_eq!(PerformanceTier::Lite.step_down(), Some(PerformanceTier::Low));
        assert_eq!(PerformanceTier::Lite.step_up(), Some(PerformanceTier::Standard));
        for (i, tier) in PerformanceTier::ALL.iter().enumerate() {
            assert_eq!(tier.index(), i);
        }
    }

    #[test]
    fn test_quality_table_monotone() {
        for pair in PerformanceTier::ALL.windows(2) {
            let lo = pair[0].render_quality();
            let hi = pair[1].render_quality();
            assert!(lo.frame_rate_target <= hi.frame_rate_target);
            assert!(lo.resolution <= hi.resolution);
            assert!(lo.effects.len() <= hi.effects.len());
            assert!(lo.antialiasing <= hi.antialiasing);
            assert!(pair[0].precision_recommendation() <= pair[1].precision_recommendation());
            assert!(pair[0].preset().resolution_scale <= pair[1].preset().resolution_scale);
        }
    }

    #[test]
    fn test_render_complexity() {
        assert_eq!(PerformanceTier::Ultra.render_complexity(), RenderComplexityMode::Pseudo3d);
        assert_eq!(PerformanceTier::Lite.render_complexity(), RenderComplexityMode::Parallax);
        assert_eq!(PerformanceTier::Low.render_complexity(), RenderComplexityMode::Flat);
    }

    #[test]
    fn test_tier_serialized_names() {
        let json = serde_json::to_string(&PerformanceTier::VeryLow).unwrap();
        assert_eq!(json, "\"very-low\"");
        for tier in PerformanceTier::ALL {
            let json = serde_json::to_string(&tier).unwrap();
            assert_eq!(json, format!("\"{}\"", tier.name()));
        }
    }

    fn any_vendor() -> impl Strategy<Value = GpuVendorClass> {
        prop_oneof![
            Just(GpuVendorClass::Nvidia),
            Just(GpuVendorClass::Amd),
            Just(GpuVendorClass::Intel),
            Just(GpuVendorClass::Apple),
            Just(GpuVendorClass::Unknown),
        ]
    }

    proptest! {
        #[test]
        fn prop_classification_is_total(memory in proptest::num::f64::ANY, vendor in any_vendor()) {
            let assessment = CapabilityClassifier::classify(&profile(memory, vendor));
            prop_assert!(PerformanceTier::ALL.contains(&assessment.performance_tier));
            prop_assert!(assessment.precision_recommendation <= 4);
        }

        #[test]
        fn prop_more_memory_never_lowers_tier(a in 0.0f64..128.0, b in 0.0f64..128.0, vendor in any_vendor()) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let t_lo = CapabilityClassifier::classify(&profile(lo, vendor)).performance_tier;
            let t_hi = CapabilityClassifier::classify(&profile(hi, vendor)).performance_tier;
            prop_assert!(t_lo <= t_hi);
        }
    }
}
