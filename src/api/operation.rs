/// Processing operations and their wire format
///
/// Each operation knows its endpoint and the ordered multipart text fields
/// that accompany the `file` part.

use std::fmt;

use crate::color::Rgb;

/// Declares a parameter enum with its wire value and display label
macro_rules! choice {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal, $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Value sent to the backend
            pub fn wire(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $($name::$variant => $label),+
                })
            }
        }
    };
}

choice!(
    /// Contrast enhancement flavor
    HistogramMethod {
        Global => "global", "Global",
        Adaptive => "adaptive", "Adaptive",
        Clahe => "clahe", "CLAHE",
    }
);

choice!(SpatialFilter {
    Mean => "mean", "Mean",
    Median => "median", "Median",
    Gaussian => "gaussian", "Gaussian",
    Bilateral => "bilateral", "Bilateral",
    Laplacian => "laplacian", "Laplacian sharpen",
    Unsharp => "unsharp", "Unsharp mask",
    Highpass => "highpass", "High-pass",
});

choice!(FrequencyFilter {
    Lowpass => "lowpass", "Low-pass",
    Highpass => "highpass", "High-pass",
    Bandpass => "bandpass", "Band-pass",
    ButterworthLowpass => "butterworth_lowpass", "Butterworth low-pass",
});

choice!(EdgeMethod {
    Sobel => "sobel", "Sobel",
    Prewitt => "prewitt", "Prewitt",
    Canny => "canny", "Canny",
    Laplacian => "laplacian", "Laplacian",
});

choice!(ThresholdMethod {
    Otsu => "otsu", "Otsu",
    Adaptive => "adaptive", "Adaptive",
});

choice!(ColorSpace {
    Hsv => "hsv", "HSV",
    Rgb => "rgb", "RGB",
});

choice!(MorphOp {
    Dilate => "dilate", "Dilate",
    Erode => "erode", "Erode",
    Opening => "opening", "Opening",
    Closing => "closing", "Closing",
    Gradient => "gradient", "Gradient",
    Tophat => "tophat", "Top-hat",
    Blackhat => "blackhat", "Black-hat",
});

/// Butterworth order; the UI does not expose it
const FREQUENCY_ORDER: u32 = 2;
/// Fixed edge detector aperture
const EDGE_KERNEL: u32 = 3;
/// Fixed adaptive threshold neighbourhood and offset
const THRESHOLD_BLOCK_SIZE: u32 = 11;
const THRESHOLD_C: i32 = 2;
/// Fixed saturation/value bounds for color segmentation
const COLOR_LOWER_SV: u32 = 50;
const COLOR_UPPER_SV: u32 = 255;

/// One request to the processing backend, parameters included
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    RemoveBackground {
        auto_crop: bool,
        /// `Some` asks the backend to composite a flat background
        background: Option<Rgb>,
    },
    Enhance,
    HistogramEqualization {
        method: HistogramMethod,
    },
    BrightnessContrast {
        brightness: i32,
        contrast: f32,
        gamma: f32,
    },
    SpatialFilter {
        filter: SpatialFilter,
        kernel_size: u32,
        sigma: f32,
    },
    FrequencyFilter {
        filter: FrequencyFilter,
        cutoff: f32,
        low_cutoff: f32,
        high_cutoff: f32,
    },
    EdgeDetection {
        method: EdgeMethod,
        threshold1: u32,
        threshold2: u32,
    },
    SegmentThreshold {
        method: ThresholdMethod,
    },
    SegmentKmeans {
        k: u32,
    },
    SegmentColor {
        color_space: ColorSpace,
        lower_h: u32,
        upper_h: u32,
    },
    SegmentWatershed,
    Morphology {
        operation: MorphOp,
        kernel_size: u32,
        iterations: u32,
    },
}

/// Operation families as the UI offers them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    RemoveBackground,
    Enhance,
    Histogram,
    BrightnessContrast,
    SpatialFilter,
    FrequencyFilter,
    EdgeDetection,
    Segmentation,
    Morphology,
}

impl Operation {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Operation::RemoveBackground { .. } => "/api/process-advanced",
            Operation::Enhance => "/api/enhance-image",
            Operation::HistogramEqualization { .. } => "/api/histogram-equalization",
            Operation::BrightnessContrast { .. } => "/api/adjust-brightness-contrast",
            Operation::SpatialFilter { .. } => "/api/spatial-filter",
            Operation::FrequencyFilter { .. } => "/api/frequency-filter",
            Operation::EdgeDetection { .. } => "/api/edge-detection",
            Operation::SegmentThreshold { .. } => "/api/segment-threshold",
            Operation::SegmentKmeans { .. } => "/api/segment-kmeans",
            Operation::SegmentColor { .. } => "/api/segment-color",
            Operation::SegmentWatershed => "/api/segment-watershed",
            Operation::Morphology { .. } => "/api/morphology",
        }
    }

    /// Text fields sent after `file`, in order
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match *self {
            Operation::RemoveBackground { auto_crop, background } => {
                let mut fields = vec![
                    ("auto_crop", auto_crop.to_string()),
                    ("add_bg_color", background.is_some().to_string()),
                ];
                if let Some(color) = background {
                    fields.push(("bg_color", color.to_form_value()));
                }
                fields
            }
            Operation::Enhance | Operation::SegmentWatershed => Vec::new(),
            Operation::HistogramEqualization { method } => vec![("method", method.wire().to_string())],
            Operation::BrightnessContrast {
                brightness,
                contrast,
                gamma,
            } => vec![
                ("brightness", brightness.to_string()),
                ("contrast", contrast.to_string()),
                ("gamma", gamma.to_string()),
            ],
            Operation::SpatialFilter {
                filter,
                kernel_size,
                sigma,
            } => vec![
                ("filter_type", filter.wire().to_string()),
                ("kernel_size", kernel_size.to_string()),
                ("sigma", sigma.to_string()),
            ],
            Operation::FrequencyFilter {
                filter,
                cutoff,
                low_cutoff,
                high_cutoff,
            } => vec![
                ("filter_type", filter.wire().to_string()),
                ("cutoff", cutoff.to_string()),
                ("order", FREQUENCY_ORDER.to_string()),
                ("low_cutoff", low_cutoff.to_string()),
                ("high_cutoff", high_cutoff.to_string()),
            ],
            Operation::EdgeDetection {
                method,
                threshold1,
                threshold2,
            } => vec![
                ("method", method.wire().to_string()),
                ("threshold1", threshold1.to_string()),
                ("threshold2", threshold2.to_string()),
                ("kernel_size", EDGE_KERNEL.to_string()),
            ],
            Operation::SegmentThreshold { method } => vec![
                ("method", method.wire().to_string()),
                ("block_size", THRESHOLD_BLOCK_SIZE.to_string()),
                ("C", THRESHOLD_C.to_string()),
            ],
            Operation::SegmentKmeans { k } => vec![("k", k.to_string())],
            Operation::SegmentColor {
                color_space,
                lower_h,
                upper_h,
            } => vec![
                ("color_space", color_space.wire().to_string()),
                ("lower_h", lower_h.to_string()),
                ("lower_s", COLOR_LOWER_SV.to_string()),
                ("lower_v", COLOR_LOWER_SV.to_string()),
                ("upper_h", upper_h.to_string()),
                ("upper_s", COLOR_UPPER_SV.to_string()),
                ("upper_v", COLOR_UPPER_SV.to_string()),
            ],
            Operation::Morphology {
                operation,
                kernel_size,
                iterations,
            } => vec![
                ("operation", operation.wire().to_string()),
                ("kernel_size", kernel_size.to_string()),
                ("iterations", iterations.to_string()),
            ],
        }
    }

    /// Short description for status lines and toasts
    pub fn describe(&self) -> String {
        match self {
            Operation::RemoveBackground { background: None, .. } => "Background removal".to_string(),
            Operation::RemoveBackground {
                background: Some(color),
                ..
            } => format!("Background color {}", color),
            Operation::Enhance => "Enhancement".to_string(),
            Operation::HistogramEqualization { method } => format!("Histogram equalization ({})", method),
            Operation::BrightnessContrast { .. } => "Brightness and contrast".to_string(),
            Operation::SpatialFilter { filter, .. } => format!("{} filter", filter),
            Operation::FrequencyFilter { filter, .. } => format!("{} frequency filter", filter),
            Operation::EdgeDetection { method, .. } => format!("Edge detection ({})", method),
            Operation::SegmentThreshold { method } => format!("{} segmentation", method),
            Operation::SegmentKmeans { k } => format!("K-means segmentation (k={})", k),
            Operation::SegmentColor { color_space, .. } => format!("{} color segmentation", color_space),
            Operation::SegmentWatershed => "Watershed segmentation".to_string(),
            Operation::Morphology { operation, .. } => format!("{} operation", operation),
        }
    }
}
