/// Editing panel parameters
///
/// Holds the value of every control in the side panel so the panel can be
/// rebuilt from state each frame. `to_operation` turns the controls for one
/// operation family into the request that gets dispatched.

use std::fmt;
use std::ops::RangeInclusive;

use crate::api::operation::{
    ColorSpace, EdgeMethod, FrequencyFilter, HistogramMethod, MorphOp, SpatialFilter, ThresholdMethod,
};
use crate::api::{Operation, OperationKind};
use crate::color::Rgb;

/// Segmentation flavor picked in the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentMethod {
    Threshold,
    Kmeans,
    Color,
    Watershed,
}

impl SegmentMethod {
    pub const ALL: &'static [SegmentMethod] = &[
        SegmentMethod::Threshold,
        SegmentMethod::Kmeans,
        SegmentMethod::Color,
        SegmentMethod::Watershed,
    ];
}

impl fmt::Display for SegmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SegmentMethod::Threshold => "Threshold",
            SegmentMethod::Kmeans => "K-means",
            SegmentMethod::Color => "Color range",
            SegmentMethod::Watershed => "Watershed",
        })
    }
}

// ========== Slider ranges ==========

pub const BRIGHTNESS_RANGE: RangeInclusive<i32> = -100..=100;
pub const CONTRAST_RANGE: RangeInclusive<f32> = 0.5..=3.0;
pub const GAMMA_RANGE: RangeInclusive<f32> = 0.1..=3.0;
/// Odd sizes only; the slider steps by 2
pub const KERNEL_RANGE: RangeInclusive<u32> = 3..=15;
pub const SIGMA_RANGE: RangeInclusive<f32> = 0.1..=5.0;
pub const CUTOFF_RANGE: RangeInclusive<f32> = 1.0..=100.0;
pub const EDGE_THRESHOLD_RANGE: RangeInclusive<u32> = 0..=255;
pub const CLUSTER_RANGE: RangeInclusive<u32> = 2..=10;
/// OpenCV hue scale
pub const HUE_RANGE: RangeInclusive<u32> = 0..=180;
pub const ITERATION_RANGE: RangeInclusive<u32> = 1..=10;

/// Every adjustable value of the editing panel
#[derive(Debug, Clone, PartialEq)]
pub struct Controls {
    // ========== Background removal ==========
    pub auto_crop: bool,
    /// Text of the custom color field
    pub custom_color: String,

    // ========== Tone ==========
    pub histogram_method: HistogramMethod,
    pub brightness: i32,
    pub contrast: f32,
    pub gamma: f32,

    // ========== Filters ==========
    pub spatial_filter: SpatialFilter,
    pub spatial_kernel: u32,
    pub sigma: f32,
    pub frequency_filter: FrequencyFilter,
    pub cutoff: f32,
    pub low_cutoff: f32,
    pub high_cutoff: f32,

    // ========== Edges ==========
    pub edge_method: EdgeMethod,
    pub threshold1: u32,
    pub threshold2: u32,

    // ========== Segmentation ==========
    pub segment_method: SegmentMethod,
    pub threshold_method: ThresholdMethod,
    pub clusters: u32,
    pub color_space: ColorSpace,
    pub lower_hue: u32,
    pub upper_hue: u32,

    // ========== Morphology ==========
    pub morph_op: MorphOp,
    pub morph_kernel: u32,
    pub iterations: u32,
}

impl Default for Controls {
    /// Same defaults the processing backend applies to a missing field
    fn default() -> Self {
        Self {
            auto_crop: true,
            custom_color: "#ffffff".to_string(),

            histogram_method: HistogramMethod::Clahe,
            brightness: 0,
            contrast: 1.0,
            gamma: 1.0,

            spatial_filter: SpatialFilter::Gaussian,
            spatial_kernel: 5,
            sigma: 1.0,
            frequency_filter: FrequencyFilter::Lowpass,
            cutoff: 30.0,
            low_cutoff: 20.0,
            high_cutoff: 60.0,

            edge_method: EdgeMethod::Canny,
            threshold1: 50,
            threshold2: 150,

            segment_method: SegmentMethod::Threshold,
            threshold_method: ThresholdMethod::Otsu,
            clusters: 3,
            color_space: ColorSpace::Hsv,
            lower_hue: 0,
            upper_hue: 180,

            morph_op: MorphOp::Opening,
            morph_kernel: 5,
            iterations: 1,
        }
    }
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Put every control back, keeping the auto-crop choice
    pub fn reset(&mut self) {
        *self = Self {
            auto_crop: self.auto_crop,
            ..Self::default()
        };
    }

    pub fn custom_rgb(&self) -> Rgb {
        Rgb::from_hex(&self.custom_color)
    }

    /// Background-removal request for the current auto-crop choice
    pub fn remove_background(&self, background: Option<Rgb>) -> Operation {
        Operation::RemoveBackground {
            auto_crop: self.auto_crop,
            background,
        }
    }

    /// Request for one operation family, built from the current values
    pub fn to_operation(&self, kind: OperationKind) -> Operation {
        match kind {
            OperationKind::RemoveBackground => self.remove_background(None),
            OperationKind::Enhance => Operation::Enhance,
            OperationKind::Histogram => Operation::HistogramEqualization {
                method: self.histogram_method,
            },
            OperationKind::BrightnessContrast => Operation::BrightnessContrast {
                brightness: self.brightness,
                contrast: self.contrast,
                gamma: self.gamma,
            },
            OperationKind::SpatialFilter => Operation::SpatialFilter {
                filter: self.spatial_filter,
                kernel_size: odd(self.spatial_kernel),
                sigma: self.sigma,
            },
            OperationKind::FrequencyFilter => Operation::FrequencyFilter {
                filter: self.frequency_filter,
                cutoff: self.cutoff,
                low_cutoff: self.low_cutoff.min(self.high_cutoff),
                high_cutoff: self.high_cutoff.max(self.low_cutoff),
            },
            OperationKind::EdgeDetection => Operation::EdgeDetection {
                method: self.edge_method,
                threshold1: self.threshold1,
                threshold2: self.threshold2,
            },
            OperationKind::Segmentation => match self.segment_method {
                SegmentMethod::Threshold => Operation::SegmentThreshold {
                    method: self.threshold_method,
                },
                SegmentMethod::Kmeans => Operation::SegmentKmeans { k: self.clusters },
                SegmentMethod::Color => Operation::SegmentColor {
                    color_space: self.color_space,
                    lower_h: self.lower_hue.min(self.upper_hue),
                    upper_h: self.upper_hue.max(self.lower_hue),
                },
                SegmentMethod::Watershed => Operation::SegmentWatershed,
            },
            OperationKind::Morphology => Operation::Morphology {
                operation: self.morph_op,
                kernel_size: odd(self.morph_kernel),
                iterations: self.iterations,
            },
        }
    }
}

/// One control moved in the panel
#[derive(Debug, Clone, PartialEq)]
pub enum Adjust {
    CustomColor(String),
    HistogramMethod(HistogramMethod),
    Brightness(i32),
    Contrast(f32),
    Gamma(f32),
    SpatialFilter(SpatialFilter),
    SpatialKernel(u32),
    Sigma(f32),
    FrequencyFilter(FrequencyFilter),
    Cutoff(f32),
    LowCutoff(f32),
    HighCutoff(f32),
    EdgeMethod(EdgeMethod),
    Threshold1(u32),
    Threshold2(u32),
    SegmentMethod(SegmentMethod),
    ThresholdMethod(ThresholdMethod),
    Clusters(u32),
    ColorSpace(ColorSpace),
    LowerHue(u32),
    UpperHue(u32),
    MorphOp(MorphOp),
    MorphKernel(u32),
    Iterations(u32),
}

impl Controls {
    pub fn adjust(&mut self, change: Adjust) {
        match change {
            Adjust::CustomColor(value) => self.custom_color = value,
            Adjust::HistogramMethod(value) => self.histogram_method = value,
            Adjust::Brightness(value) => self.brightness = value,
            Adjust::Contrast(value) => self.contrast = value,
            Adjust::Gamma(value) => self.gamma = value,
            Adjust::SpatialFilter(value) => self.spatial_filter = value,
            Adjust::SpatialKernel(value) => self.spatial_kernel = value,
            Adjust::Sigma(value) => self.sigma = value,
            Adjust::FrequencyFilter(value) => self.frequency_filter = value,
            Adjust::Cutoff(value) => self.cutoff = value,
            Adjust::LowCutoff(value) => self.low_cutoff = value,
            Adjust::HighCutoff(value) => self.high_cutoff = value,
            Adjust::EdgeMethod(value) => self.edge_method = value,
            Adjust::Threshold1(value) => self.threshold1 = value,
            Adjust::Threshold2(value) => self.threshold2 = value,
            Adjust::SegmentMethod(value) => self.segment_method = value,
            Adjust::ThresholdMethod(value) => self.threshold_method = value,
            Adjust::Clusters(value) => self.clusters = value,
            Adjust::ColorSpace(value) => self.color_space = value,
            Adjust::LowerHue(value) => self.lower_hue = value,
            Adjust::UpperHue(value) => self.upper_hue = value,
            Adjust::MorphOp(value) => self.morph_op = value,
            Adjust::MorphKernel(value) => self.morph_kernel = value,
            Adjust::Iterations(value) => self.iterations = value,
        }
    }
}

/// Kernel sizes must be odd
fn odd(size: u32) -> u32 {
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}
