//! Hardware profile detection
//!
//! Collects best-effort memory, CPU, GPU and device-class signals and folds
//! them into a [`HardwareProfile`]. Every signal is optional: a missing one
//! falls back to a conservative default and is logged, never raised.

use crate::config::TuningConfig;
use crate::error::{PerfTierError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use sysinfo::System;
use tracing::{debug, info, warn};

/// Memory assumed when nothing better is known
pub const DEFAULT_MEMORY_GB: f64 = 4.0;

/// CPU cores assumed when nothing better is known
pub const DEFAULT_CPU_CORES: usize = 2;

/// Largest screen dimension still treated as a laptop panel
pub const LAPTOP_MAX_SCREEN_DIM: u32 = 1920;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// GPU vendor classification
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum GpuVendorClass {
    /// NVIDIA discrete GPU
    Nvidia,
    /// AMD Radeon (discrete or integrated)
    Amd,
    /// Intel integrated or Arc
    Intel,
    /// Apple Silicon
    Apple,
    /// Could not be classified
    #[default]
    Unknown,
}

/// Keyword sets checked in order, first match wins
const VENDOR_KEYWORDS: &[(GpuVendorClass, &[&str])] = &[
    (GpuVendorClass::Nvidia, &["nvidia", "geforce", "rtx"]),
    (GpuVendorClass::Amd, &["amd", "radeon"]),
    (GpuVendorClass::Intel, &["intel", "iris", "uhd", "arc"]),
    (GpuVendorClass::Apple, &["apple", "m1", "m2", "m3"]),
];

impl GpuVendorClass {
    /// Classify a renderer/descriptor string
    pub fn from_descriptor(descriptor: &str) -> Self {
        let lower = descriptor.to_lowercase();
        VENDOR_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(class, _)| *class)
            .unwrap_or(GpuVendorClass::Unknown)
    }

    /// Map a PCI vendor id as found in sysfs (e.g. "0x10de")
    pub fn from_pci_vendor(id: &str) -> Option<Self> {
        match id.trim().to_lowercase().as_str() {
            "0x10de" => Some(GpuVendorClass::Nvidia),
            "0x1002" | "0x1022" => Some(GpuVendorClass::Amd),
            "0x8086" => Some(GpuVendorClass::Intel),
            "0x106b" => Some(GpuVendorClass::Apple),
            _ => None,
        }
    }

    /// Last-resort memory guess when no introspection signal exists
    ///
    /// Approximate only. Used so classification has something to key on.
    pub fn estimated_memory_gb(&self) -> f64 {
        match self {
            GpuVendorClass::Nvidia => 16.0,
            GpuVendorClass::Apple => 16.0,
            GpuVendorClass::Amd => 8.0,
            GpuVendorClass::Intel => 8.0,
            GpuVendorClass::Unknown => DEFAULT_MEMORY_GB,
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            GpuVendorClass::Nvidia => "NVIDIA",
            GpuVendorClass::Amd => "AMD",
            GpuVendorClass::Intel => "Intel",
            GpuVendorClass::Apple => "Apple",
            GpuVendorClass::Unknown => "Unknown",
        }
    }
}

/// Form factor of the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// Desktop workstation
    #[default]
    Desktop,
    /// Laptop / notebook
    Laptop,
    /// Tablet
    Tablet,
    /// Phone
    Mobile,
}

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsFamily {
    /// Microsoft Windows
    Windows,
    /// Apple macOS
    MacOs,
    /// Linux distributions
    Linux,
    /// ChromeOS
    ChromeOs,
    /// Android
    Android,
    /// Apple iOS / iPadOS
    Ios,
    /// Anything else
    Other,
}

impl OsFamily {
    /// Family of the running binary
    pub fn current() -> Self {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Parse an OS name as reported by `std::env::consts::OS`
    pub fn from_os_name(os: &str) -> Self {
        match os.to_lowercase().as_str() {
            "windows" => OsFamily::Windows,
            "macos" => OsFamily::MacOs,
            "linux" => OsFamily::Linux,
            "chromeos" => OsFamily::ChromeOs,
            "android" => OsFamily::Android,
            "ios" => OsFamily::Ios,
            _ => OsFamily::Other,
        }
    }

    /// Whether this family runs on desktop-class form factors
    pub fn is_desktop(&self) -> bool {
        matches!(
            self,
            OsFamily::Windows | OsFamily::MacOs | OsFamily::Linux | OsFamily::ChromeOs
        )
    }
}

/// Raw probe output before defaults are applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareSignals {
    /// Total memory in bytes, if introspectable
    pub memory_bytes: Option<u64>,
    /// Logical CPU count
    pub cpu_cores: Option<usize>,
    /// Renderer / GPU descriptor string
    pub gpu_descriptor: Option<String>,
    /// Touch input available
    pub touch_capable: bool,
    /// Largest screen dimension in pixels
    pub screen_max_dim: Option<u32>,
    /// Operating system family
    pub os_family: OsFamily,
    /// Direct phone signal
    pub mobile_hint: bool,
    /// Direct tablet signal
    pub tablet_hint: bool,
    /// Modern GPU API available
    pub webgl2_supported: Option<bool>,
}

impl Default for HardwareSignals {
    fn default() -> Self {
        Self {
            memory_bytes: None,
            cpu_cores: None,
            gpu_descriptor: None,
            touch_capable: false,
            screen_max_dim: None,
            os_family: OsFamily::Other,
            mobile_hint: false,
            tablet_hint: false,
            webgl2_supported: None,
        }
    }
}

impl HardwareSignals {
    /// Infer the device class
    ///
    /// Direct mobile/tablet signals win. Otherwise a touch-capable, small
    /// screen on a desktop OS family is a laptop; everything else is a
    /// desktop.
    pub fn device_class(&self) -> DeviceClass {
        if self.mobile_hint {
            return DeviceClass::Mobile;
        }
        if self.tablet_hint {
            return DeviceClass::Tablet;
        }
        let small_screen = self
            .screen_max_dim
            .map_or(false, |dim| dim <= LAPTOP_MAX_SCREEN_DIM);
        if self.touch_capable && small_screen && self.os_family.is_desktop() {
            DeviceClass::Laptop
        } else {
            DeviceClass::Desktop
        }
    }
}

/// Heuristic hardware profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Memory in GB (heuristic)
    pub memory_gb: f64,
    /// Logical CPU cores
    pub cpu_cores: usize,
    /// GPU vendor class
    pub gpu_vendor: GpuVendorClass,
    /// GPU model hint (raw descriptor)
    pub gpu_model_hint: String,
    /// Device form factor
    pub device_class: DeviceClass,
    /// Modern GPU API available
    pub webgl2_supported: bool,
    /// Memory was guessed from the GPU vendor rather than read
    #[serde(default)]
    pub memory_estimated: bool,
}

impl Default for HardwareProfile {
    fn default() -> Self {
        Self {
            memory_gb: DEFAULT_MEMORY_GB,
            cpu_cores: DEFAULT_CPU_CORES,
            gpu_vendor: GpuVendorClass::Unknown,
            gpu_model_hint: "unknown".to_string(),
            device_class: DeviceClass::Desktop,
            webgl2_supported: false,
            memory_estimated: true,
        }
    }
}

impl HardwareProfile {
    /// Fold raw signals into a profile, filling gaps with defaults
    pub fn from_signals(signals: &HardwareSignals) -> Self {
        let gpu_model_hint = signals
            .gpu_descriptor
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let gpu_vendor = GpuVendorClass::from_descriptor(&gpu_model_hint);

        let (memory_gb, memory_estimated) = match signals.memory_bytes {
            Some(bytes) if bytes > 0 => (bytes as f64 / BYTES_PER_GB, false),
            _ => {
                let guess = gpu_vendor.estimated_memory_gb();
                warn!(
                    "Memory not introspectable, estimating {} GB from {} GPU class",
                    guess,
                    gpu_vendor.name()
                );
                (guess, true)
            }
        };

        let cpu_cores = match signals.cpu_cores {
            Some(cores) if cores > 0 => cores,
            _ => {
                warn!("CPU core count unavailable, assuming {}", DEFAULT_CPU_CORES);
                DEFAULT_CPU_CORES
            }
        };

        HardwareProfile {
            memory_gb,
            cpu_cores,
            gpu_vendor,
            gpu_model_hint,
            device_class: signals.device_class(),
            webgl2_supported: signals.webgl2_supported.unwrap_or(false),
            memory_estimated,
        }
    }

    /// Print profile summary to console
    pub fn print_summary(&self) {
        println!("=== Hardware Profile ===\n");
        let memory_bytes = (self.memory_gb * BYTES_PER_GB) as u64;
        println!(
            "  Memory:       {}{}",
            humansize::format_size(memory_bytes, humansize::BINARY),
            if self.memory_estimated { " (estimated)" } else { "" }
        );
        println!("  CPU cores:    {}", self.cpu_cores);
        println!("  GPU vendor:   {}", self.gpu_vendor.name());
        println!("  GPU model:    {}", self.gpu_model_hint);
        println!("  Device class: {:?}", self.device_class);
        println!(
            "  Modern GPU API: {}",
            if self.webgl2_supported { "yes" } else { "no" }
        );
    }
}

/// Source of raw hardware signals
///
/// Probing may block; the profiler runs it off the async runtime.
pub trait SignalSource: Send + Sync + 'static {
    /// Gather whatever signals are available
    fn probe(&self) -> Result<HardwareSignals>;
}

/// Signals from the running host via sysinfo and sysfs
#[derive(Debug, Default, Clone)]
pub struct SystemSignalSource;

impl SignalSource for SystemSignalSource {
    fn probe(&self) -> Result<HardwareSignals> {
        let mut sys = System::new_all();
        sys.refresh_all();

        let os_family = OsFamily::current();

        let memory_bytes = env_memory_override().or_else(|| {
            let total = sys.total_memory();
            (total > 0).then_some(total)
        });

        let cpu_brand = sys
            .cpus()
            .first()
            .map(|c| c.brand().to_string())
            .unwrap_or_default();

        let gpu_descriptor = std::env::var("PERFTIER_GPU")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .or_else(detect_gpu_descriptor)
            .or_else(|| {
                // Apple Silicon exposes the GPU through the SoC name
                (os_family == OsFamily::MacOs && cpu_brand.to_lowercase().contains("apple"))
                    .then(|| cpu_brand.clone())
            });

        let device_override = std::env::var("PERFTIER_DEVICE")
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        let signals = HardwareSignals {
            memory_bytes,
            cpu_cores: Some(num_cpus::get()),
            webgl2_supported: Some(gpu_descriptor.is_some()),
            gpu_descriptor,
            touch_capable: detect_touch(),
            screen_max_dim: detect_screen_max_dim(),
            os_family,
            mobile_hint: device_override == "mobile"
                || matches!(os_family, OsFamily::Android | OsFamily::Ios),
            tablet_hint: device_override == "tablet",
        };

        debug!("Probed hardware signals: {:?}", signals);
        Ok(signals)
    }
}

fn env_memory_override() -> Option<u64> {
    let gb: f64 = std::env::var("PERFTIER_MEMORY_GB").ok()?.trim().parse().ok()?;
    (gb > 0.0).then(|| (gb * BYTES_PER_GB) as u64)
}

/// Linux: read PCI vendor ids of DRM cards
#[cfg(target_os = "linux")]
fn detect_gpu_descriptor() -> Option<String> {
    let drm = Path::new("/sys/class/drm");
    let entries = std::fs::read_dir(drm).ok()?;

    let mut found = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        // card0, card1, ... but not connector entries like card0-HDMI-A-1
        if !name.starts_with("card") || !name[4..].chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let vendor_path = entry.path().join("device/vendor");
        if let Ok(vendor) = std::fs::read_to_string(&vendor_path) {
            if let Some(class) = GpuVendorClass::from_pci_vendor(&vendor) {
                found.push((name, class, vendor.trim().to_string()));
            }
        }
    }

    // Prefer a discrete vendor over integrated when both are present
    found.sort_by_key(|(_, class, _)| match class {
        GpuVendorClass::Nvidia => 0,
        GpuVendorClass::Amd => 1,
        GpuVendorClass::Apple => 2,
        GpuVendorClass::Intel => 3,
        GpuVendorClass::Unknown => 4,
    });
    found
        .into_iter()
        .next()
        .map(|(card, class, vendor)| format!("{} ({}, pci {})", class.name(), card, vendor))
}

#[cfg(not(target_os = "linux"))]
fn detect_gpu_descriptor() -> Option<String> {
    None
}

#[cfg(target_os = "linux")]
fn detect_touch() -> bool {
    std::fs::read_to_string("/proc/bus/input/devices")
        .map(|content| content.to_lowercase().contains("touchscreen"))
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn detect_touch() -> bool {
    false
}

/// Linux: largest dimension of the preferred mode of any connected output
#[cfg(target_os = "linux")]
fn detect_screen_max_dim() -> Option<u32> {
    let entries = std::fs::read_dir("/sys/class/drm").ok()?;
    entries
        .flatten()
        .filter_map(|entry| std::fs::read_to_string(entry.path().join("modes")).ok())
        .filter_map(|modes| modes.lines().next().and_then(parse_mode_line))
        .max()
}

#[cfg(not(target_os = "linux"))]
fn detect_screen_max_dim() -> Option<u32> {
    None
}

/// Parse "1920x1080" (optionally suffixed, e.g. "1920x1080i") to its larger side
fn parse_mode_line(line: &str) -> Option<u32> {
    let (w, h) = line.trim().split_once('x')?;
    let w: u32 = w.parse().ok()?;
    let h: u32 = h
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .ok()?;
    Some(w.max(h))
}

/// One-shot, coalescing hardware profiler
///
/// A detection already in flight is never duplicated: concurrent callers
/// wait for it and receive its result.
pub struct HardwareProfiler {
    source: Arc<dyn SignalSource>,
    timeout: Duration,
    in_flight: tokio::sync::Mutex<()>,
    generation: AtomicU64,
    last: RwLock<Option<HardwareProfile>>,
}

impl HardwareProfiler {
    /// Profiler for the running host
    pub fn new(config: &TuningConfig) -> Self {
        Self::with_source(Arc::new(SystemSignalSource), config.detect_timeout())
    }

    /// Profiler over a custom signal source
    pub fn with_source(source: Arc<dyn SignalSource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            in_flight: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            last: RwLock::new(None),
        }
    }

    /// Detect the hardware profile
    ///
    /// Never fails: probe errors and timeouts degrade to
    /// [`HardwareProfile::default`] with a warning.
    pub async fn detect(&self) -> HardwareProfile {
        let seen = self.generation.load(Ordering::Acquire);
        let _guard = self.in_flight.lock().await;

        if self.generation.load(Ordering::Acquire) != seen {
            if let Some(profile) = self.last_profile() {
                debug!("Joined in-flight hardware detection");
                return profile;
            }
        }

        let profile = match self.probe_with_timeout().await {
            Ok(signals) => HardwareProfile::from_signals(&signals),
            Err(e) => {
                warn!("Hardware detection degraded to defaults: {}", e);
                HardwareProfile::default()
            }
        };

        info!(
            "Hardware profile: {:.1} GB, {} cores, {} GPU, {:?}",
            profile.memory_gb,
            profile.cpu_cores,
            profile.gpu_vendor.name(),
            profile.device_class
        );

        if let Ok(mut last) = self.last.write() {
            *last = Some(profile.clone());
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        profile
    }

    /// Most recent completed detection
    pub fn last_profile(&self) -> Option<HardwareProfile> {
        self.last.read().ok().and_then(|last| last.clone())
    }

    /// Number of completed detections
    pub fn detections(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    async fn probe_with_timeout(&self) -> Result<HardwareSignals> {
        let source = Arc::clone(&self.source);
        let probe = tokio::task::spawn_blocking(move || source.probe());

        match tokio::time::timeout(self.timeout, probe).await {
            Err(_) => Err(PerfTierError::DetectionTimeout(self.timeout.as_millis() as u64)),
            Ok(Err(join_err)) => Err(PerfTierError::DetectionFailed(join_err.to_string())),
            Ok(Ok(result)) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct FixedSource(HardwareSignals);

    impl SignalSource for FixedSource {
        fn probe(&self) -> Result<HardwareSignals> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    impl SignalSource for FailingSource {
        fn probe(&self) -> Result<HardwareSignals> {
            Err(PerfTierError::DetectionFailed("no sysfs".into()))
        }
    }

    struct SlowSource {
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl SignalSource for SlowSource {
        fn probe(&self) -> Result<HardwareSignals> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            Ok(HardwareSignals {
                memory_bytes: Some(8 * 1024 * 1024 * 1024),
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_vendor_keywords() {
        assert_eq!(
            GpuVendorClass::from_descriptor("NVIDIA GeForce RTX 4090"),
            GpuVendorClass::Nvidia
        );
        assert_eq!(GpuVendorClass::from_descriptor("GeForce GTX 1060"), GpuVendorClass::Nvidia);
        assert_eq!(GpuVendorClass::from_descriptor("AMD Radeon RX 7900"), GpuVendorClass::Amd);
        assert_eq!(
            GpuVendorClass::from_descriptor("Intel(R) Iris(R) Xe Graphics"),
            GpuVendorClass::Intel
        );
        assert_eq!(GpuVendorClass::from_descriptor("Apple M2 Pro"), GpuVendorClass::Apple);
        assert_eq!(GpuVendorClass::from_descriptor("llvmpipe"), GpuVendorClass::Unknown);
        assert_eq!(GpuVendorClass::from_descriptor(""), GpuVendorClass::Unknown);
    }

    #[test]
    fn test_vendor_first_match_wins() {
        // Mentions both; nvidia keywords are checked first
        assert_eq!(
            GpuVendorClass::from_descriptor("RTX on Intel host"),
            GpuVendorClass::Nvidia
        );
    }

    #[test]
    fn test_pci_vendor_ids() {
        assert_eq!(GpuVendorClass::from_pci_vendor("0x10de\n"), Some(GpuVendorClass::Nvidia));
        assert_eq!(GpuVendorClass::from_pci_vendor("0x8086"), Some(GpuVendorClass::Intel));
        assert_eq!(GpuVendorClass::from_pci_vendor("0x1234"), None);
    }

    #[test]
    fn test_device_class_inference() {
        let laptop = HardwareSignals {
            touch_capable: true,
            screen_max_dim: Some(1920),
            os_family: OsFamily::Windows,
            ..Default::default()
        };
        assert_eq!(laptop.device_class(), DeviceClass::Laptop);

        let big_touch = HardwareSignals {
            screen_max_dim: Some(3840),
            ..laptop.clone()
        };
        assert_eq!(big_touch.device_class(), DeviceClass::Desktop);

        let no_touch = HardwareSignals {
            touch_capable: false,
            ..laptop.clone()
        };
        assert_eq!(no_touch.device_class(), DeviceClass::Desktop);

        let other_os = HardwareSignals {
            os_family: OsFamily::Other,
            ..laptop.clone()
        };
        assert_eq!(other_os.device_class(), DeviceClass::Desktop);

        let phone = HardwareSignals {
            mobile_hint: true,
            tablet_hint: true,
            ..laptop.clone()
        };
        assert_eq!(phone.device_class(), DeviceClass::Mobile);

        let tablet = HardwareSignals {
            tablet_hint: true,
            ..laptop
        };
        assert_eq!(tablet.device_class(), DeviceClass::Tablet);
    }

    #[test]
    fn test_profile_defaults_from_empty_signals() {
        let profile = HardwareProfile::from_signals(&HardwareSignals::default());
        assert_eq!(profile.memory_gb, DEFAULT_MEMORY_GB);
        assert!(profile.memory_estimated);
        assert_eq!(profile.device_class, DeviceClass::Desktop);
        assert!(!profile.webgl2_supported);
        assert_eq!(profile.gpu_vendor, GpuVendorClass::Unknown);
    }

    #[test]
    fn test_memory_estimated_from_vendor() {
        let signals = HardwareSignals {
            gpu_descriptor: Some("GeForce RTX 3080".into()),
            ..Default::default()
        };
        let profile = HardwareProfile::from_signals(&signals);
        assert_eq!(profile.gpu_vendor, GpuVendorClass::Nvidia);
        assert_eq!(profile.memory_gb, 16.0);
        assert!(profile.memory_estimated);
    }

    #[test]
    fn test_memory_read_directly() {
        let signals = HardwareSignals {
            memory_bytes: Some(32 * 1024 * 1024 * 1024),
            cpu_cores: Some(12),
            ..Default::default()
        };
        let profile = HardwareProfile::from_signals(&signals);
        assert_eq!(profile.memory_gb, 32.0);
        assert!(!profile.memory_estimated);
        assert_eq!(profile.cpu_cores, 12);
    }

    #[test]
    fn test_parse_mode_line() {
        assert_eq!(parse_mode_line("1920x1080"), Some(1920));
        assert_eq!(parse_mode_line("1080x2400"), Some(2400));
        assert_eq!(parse_mode_line("1920x1080i"), Some(1920));
        assert_eq!(parse_mode_line("garbage"), None);
    }

    #[tokio::test]
    async fn test_profiler_uses_source() {
        let signals = HardwareSignals {
            memory_bytes: Some(6 * 1024 * 1024 * 1024),
            cpu_cores: Some(8),
            gpu_descriptor: Some("AMD Radeon 780M".into()),
            webgl2_supported: Some(true),
            ..Default::default()
        };
        let profiler =
            HardwareProfiler::with_source(Arc::new(FixedSource(signals)), Duration::from_secs(3));
        let profile = profiler.detect().await;
        assert_eq!(profile.gpu_vendor, GpuVendorClass::Amd);
        assert_eq!(profile.memory_gb, 6.0);
        assert!(profile.webgl2_supported);
        assert_eq!(profiler.last_profile(), Some(profile));
    }

    #[test]
    fn test_profiler_from_sync_caller() {
        let profiler = HardwareProfiler::with_source(
            Arc::new(FixedSource(HardwareSignals::default())),
            Duration::from_secs(3),
        );
        let profile = tokio_test::block_on(profiler.detect());
        assert_eq!(profile.memory_gb, DEFAULT_MEMORY_GB);
        assert_eq!(profiler.detections(), 1);
    }

    #[tokio::test]
    async fn test_profiler_failure_degrades_to_default() {
        let profiler = HardwareProfiler::with_source(Arc::new(FailingSource), Duration::from_secs(3));
        let profile = profiler.detect().await;
        assert_eq!(profile, HardwareProfile::default());
    }

    #[tokio::test]
    async fn test_profiler_timeout_degrades_to_default() {
        let source = SlowSource {
            delay: Duration::from_millis(1500),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let profiler = HardwareProfiler::with_source(Arc::new(source), Duration::from_millis(200));
        let profile = profiler.detect().await;
        assert_eq!(profile, HardwareProfile::default());
    }

    #[tokio::test]
    async fn test_concurrent_detections_coalesce() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = SlowSource {
            delay: Duration::from_millis(100),
            calls: Arc::clone(&calls),
        };
        let profiler = HardwareProfiler::with_source(Arc::new(source), Duration::from_secs(3));

        let (a, b) = tokio::join!(profiler.detect(), profiler.detect());
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(profiler.detections(), 1);

        // An explicit re-detect afterwards probes again
        profiler.detect().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_system_source_probe() {
        let signals = SystemSignalSource.probe().unwrap();
        assert!(signals.cpu_cores.unwrap_or(0) > 0);
    }
}
