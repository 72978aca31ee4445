/// View builders for the studio pages
///
/// Plain functions from state to widgets. They never touch the session or
/// the clients, so the app struct stays the only owner of state.

use iced::widget::{
    button, checkbox, column, container, horizontal_space, image, pick_list, progress_bar, row, slider, text,
    text_input, Column,
};
use iced::{Alignment, Element, Length};
use iced_aw::Wrap;

use crate::api::operation::{
    ColorSpace, EdgeMethod, FrequencyFilter, HistogramMethod, MorphOp, SpatialFilter, ThresholdMethod,
};
use crate::api::{BackendStatus, BatchOutcome, BatchReport, ModelStatus, ModelSummary, OperationKind};
use crate::color::Background;
use crate::state::controls::{
    Adjust, Controls, SegmentMethod, BRIGHTNESS_RANGE, CLUSTER_RANGE, CONTRAST_RANGE, CUTOFF_RANGE,
    EDGE_THRESHOLD_RANGE, GAMMA_RANGE, HUE_RANGE, ITERATION_RANGE, KERNEL_RANGE, SIGMA_RANGE,
};
use crate::state::generation::GenerationJob;
use crate::state::session::{Phase, Session};
use crate::upload::UploadLimits;
use crate::{Message, Page};

const PANEL_WIDTH: f32 = 320.0;
const THUMB_SIZE: f32 = 180.0;

// ========== Header ==========

pub fn header<'a>(page: Page, backend: Option<&'a BackendStatus>) -> Element<'a, Message> {
    let tab = |label: &'static str, target: Page| {
        button(text(label).size(14))
            .padding([6, 12])
            .style(if page == target { button::primary } else { button::secondary })
            .on_press(Message::ShowPage(target))
    };

    let status = match backend {
        Some(status) if status.is_online() => text(format!("● Online ({})", status.device)).size(13),
        Some(status) => text(format!("● {}", status.api_status)).size(13),
        None => text("● Offline").size(13),
    };

    row![
        text("Stellarion Studio").size(26),
        horizontal_space(),
        tab("Studio", Page::Studio),
        tab("Batch", Page::Batch),
        tab("3D Models", Page::Models),
        status,
        button(text("Check backend").size(13)).on_press(Message::CheckBackend),
    ]
    .spacing(12)
    .align_y(Alignment::Center)
    .padding(12)
    .into()
}

// ========== Studio page ==========

pub fn upload_prompt<'a>(limits: UploadLimits) -> Element<'a, Message> {
    let content = column![
        text("Drop an image anywhere in this window").size(22),
        button("Choose image").on_press(Message::OpenFile).padding(10),
        text(format!(
            "Images up to {} MB. Batches of up to {} files.",
            limits.max_bytes / (1024 * 1024),
            limits.max_files
        ))
        .size(13),
    ]
    .spacing(16)
    .align_x(Alignment::Center);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}

/// Actions on the loaded image
pub fn toolbar<'a>(session: &Session, busy: Option<String>) -> Element<'a, Message> {
    let compare_label = if session.is_comparing() { "Show result" } else { "Show original" };

    let mut bar = row![
        button("← Back").on_press(Message::Back),
        button(compare_label).on_press(Message::ToggleCompare),
        button("Reset to original").on_press(Message::ResetToOriginal),
        button("Reset to processed").on_press(Message::ResetToProcessed),
        button("Download").on_press(Message::Download),
    ]
    .spacing(8)
    .align_y(Alignment::Center);

    let stage = match session.phase() {
        Phase::Empty => "",
        Phase::Original { .. } => "Original",
        Phase::Processed { .. } => "Background removed",
        Phase::Edited { .. } => "Edited",
    };
    bar = bar.push(text(stage).size(13));

    if let Some(label) = busy {
        bar = bar.push(text(label).size(13));
    }

    bar.into()
}

pub fn background_section<'a>(selected: Background, custom_open: bool, controls: &'a Controls) -> Element<'a, Message> {
    let presets = Background::PRESETS.iter().fold(row![].spacing(6), |row, preset| {
        let active = *preset == selected || (custom_open && *preset == Background::Custom);
        row.push(
            button(text(preset.label()).size(13))
                .style(if active { button::primary } else { button::secondary })
                .on_press(Message::SelectBackground(*preset)),
        )
    });

    let mut content = column![
        text("Background").size(16),
        checkbox("Auto-crop to subject", controls.auto_crop).on_toggle(Message::AutoCropToggled),
        button("Remove background").on_press(Message::Apply(OperationKind::RemoveBackground)),
        presets,
    ]
    .spacing(8);

    if custom_open {
        content = content.push(
            row![
                text_input("#rrggbb", &controls.custom_color)
                    .on_input(|value| Message::Adjust(Adjust::CustomColor(value)))
                    .on_submit(Message::ApplyCustomColor)
                    .width(Length::Fill),
                button("Apply").on_press(Message::ApplyCustomColor),
            ]
            .spacing(6),
        );
    }

    content.into()
}

/// Side panel with one block per operation family
pub fn editing_panel(controls: &Controls) -> Element<'_, Message> {
    let tone = column![
        text("Enhance").size(16),
        button("Enhance image").on_press(Message::Apply(OperationKind::Enhance)),
        pick_list(HistogramMethod::ALL, Some(controls.histogram_method), |v| {
            Message::Adjust(Adjust::HistogramMethod(v))
        }),
        apply(OperationKind::Histogram, "Equalize histogram"),
        labeled(
            "Brightness",
            controls.brightness.to_string(),
            slider(BRIGHTNESS_RANGE, controls.brightness, |v| {
                Message::Adjust(Adjust::Brightness(v))
            }),
        ),
        labeled(
            "Contrast",
            format!("{:.2}", controls.contrast),
            slider(CONTRAST_RANGE, controls.contrast, |v| Message::Adjust(Adjust::Contrast(v))).step(0.05f32),
        ),
        labeled(
            "Gamma",
            format!("{:.2}", controls.gamma),
            slider(GAMMA_RANGE, controls.gamma, |v| Message::Adjust(Adjust::Gamma(v))).step(0.05f32),
        ),
        apply(OperationKind::BrightnessContrast, "Apply tone"),
    ];

    let mut frequency = column![
        text("Frequency filter").size(16),
        pick_list(FrequencyFilter::ALL, Some(controls.frequency_filter), |v| {
            Message::Adjust(Adjust::FrequencyFilter(v))
        }),
    ];
    frequency = if controls.frequency_filter == FrequencyFilter::Bandpass {
        frequency
            .push(labeled(
                "Low cutoff",
                format!("{:.0}", controls.low_cutoff),
                slider(CUTOFF_RANGE, controls.low_cutoff, |v| Message::Adjust(Adjust::LowCutoff(v))),
            ))
            .push(labeled(
                "High cutoff",
                format!("{:.0}", controls.high_cutoff),
                slider(CUTOFF_RANGE, controls.high_cutoff, |v| Message::Adjust(Adjust::HighCutoff(v))),
            ))
    } else {
        frequency.push(labeled(
            "Cutoff",
            format!("{:.0}", controls.cutoff),
            slider(CUTOFF_RANGE, controls.cutoff, |v| Message::Adjust(Adjust::Cutoff(v))),
        ))
    };
    frequency = frequency.push(apply(OperationKind::FrequencyFilter, "Apply filter"));

    let spatial = column![
        text("Spatial filter").size(16),
        pick_list(SpatialFilter::ALL, Some(controls.spatial_filter), |v| {
            Message::Adjust(Adjust::SpatialFilter(v))
        }),
        labeled(
            "Kernel size",
            controls.spatial_kernel.to_string(),
            slider(KERNEL_RANGE, controls.spatial_kernel, |v| Message::Adjust(Adjust::SpatialKernel(v)))
                .step(2u32),
        ),
        labeled(
            "Sigma",
            format!("{:.1}", controls.sigma),
            slider(SIGMA_RANGE, controls.sigma, |v| Message::Adjust(Adjust::Sigma(v))).step(0.1f32),
        ),
        apply(OperationKind::SpatialFilter, "Apply filter"),
    ];

    let edges = column![
        text("Edge detection").size(16),
        pick_list(EdgeMethod::ALL, Some(controls.edge_method), |v| Message::Adjust(Adjust::EdgeMethod(v))),
        labeled(
            "Threshold 1",
            controls.threshold1.to_string(),
            slider(EDGE_THRESHOLD_RANGE, controls.threshold1, |v| {
                Message::Adjust(Adjust::Threshold1(v))
            }),
        ),
        labeled(
            "Threshold 2",
            controls.threshold2.to_string(),
            slider(EDGE_THRESHOLD_RANGE, controls.threshold2, |v| {
                Message::Adjust(Adjust::Threshold2(v))
            }),
        ),
        row![
            apply(OperationKind::EdgeDetection, "Detect edges"),
            button("Compare all").on_press(Message::CompareEdges),
        ]
        .spacing(6),
    ];

    let mut segmentation = column![
        text("Segmentation").size(16),
        pick_list(SegmentMethod::ALL, Some(controls.segment_method), |v| {
            Message::Adjust(Adjust::SegmentMethod(v))
        }),
    ];
    segmentation = match controls.segment_method {
        SegmentMethod::Threshold => segmentation.push(pick_list(
            ThresholdMethod::ALL,
            Some(controls.threshold_method),
            |v| Message::Adjust(Adjust::ThresholdMethod(v)),
        )),
        SegmentMethod::Kmeans => segmentation.push(labeled(
            "Clusters",
            controls.clusters.to_string(),
            slider(CLUSTER_RANGE, controls.clusters, |v| Message::Adjust(Adjust::Clusters(v))),
        )),
        SegmentMethod::Color => segmentation
            .push(pick_list(ColorSpace::ALL, Some(controls.color_space), |v| {
                Message::Adjust(Adjust::ColorSpace(v))
            }))
            .push(labeled(
                "Lower hue",
                controls.lower_hue.to_string(),
                slider(HUE_RANGE, controls.lower_hue, |v| Message::Adjust(Adjust::LowerHue(v))),
            ))
            .push(labeled(
                "Upper hue",
                controls.upper_hue.to_string(),
                slider(HUE_RANGE, controls.upper_hue, |v| Message::Adjust(Adjust::UpperHue(v))),
            )),
        SegmentMethod::Watershed => segmentation,
    };
    segmentation = segmentation.push(apply(OperationKind::Segmentation, "Segment"));

    let morphology = column![
        text("Morphology").size(16),
        pick_list(MorphOp::ALL, Some(controls.morph_op), |v| Message::Adjust(Adjust::MorphOp(v))),
        labeled(
            "Kernel size",
            controls.morph_kernel.to_string(),
            slider(KERNEL_RANGE, controls.morph_kernel, |v| Message::Adjust(Adjust::MorphKernel(v)))
                .step(2u32),
        ),
        labeled(
            "Iterations",
            controls.iterations.to_string(),
            slider(ITERATION_RANGE, controls.iterations, |v| {
                Message::Adjust(Adjust::Iterations(v))
            }),
        ),
        apply(OperationKind::Morphology, "Apply"),
    ];

    let reset = button("Reset controls").on_press_maybe((!controls.is_default()).then_some(Message::ResetControls));

    column![
        tone.spacing(8),
        spatial.spacing(8),
        frequency.spacing(8),
        edges.spacing(8),
        segmentation.spacing(8),
        morphology.spacing(8),
        reset,
    ]
    .spacing(24)
    .width(Length::Fixed(PANEL_WIDTH))
    .into()
}

/// Side-by-side output of every edge detector
pub fn edge_grid(results: &[(String, image::Handle)]) -> Element<'_, Message> {
    let cards: Vec<Element<'_, Message>> = results
        .iter()
        .map(|(method, handle)| {
            column![
                image(handle.clone()).width(Length::Fixed(THUMB_SIZE)),
                text(method.as_str()).size(13),
            ]
            .spacing(4)
            .align_x(Alignment::Center)
            .into()
        })
        .collect();

    Wrap::with_elements(cards).spacing(12.0).line_spacing(12.0).into()
}

// ========== Batch page ==========

pub fn batch_page<'a>(
    report: Option<&'a BatchReport>,
    thumbnails: &'a [Option<image::Handle>],
    busy: Option<&'a str>,
) -> Element<'a, Message> {
    let actions = row![
        button("Select images").on_press(Message::OpenBatch),
        button("Select folder").on_press(Message::OpenBatchFolder),
    ]
    .spacing(8);

    let mut page = column![text("Batch background removal").size(22), actions].spacing(16);

    if let Some(label) = busy {
        page = page.push(text(label).size(14));
    }

    let Some(report) = report else {
        return page.into();
    };

    page = page.push(
        row![
            text(format!(
                "{} of {} processed, {} failed",
                report.successful, report.total, report.failed
            ))
            .size(14),
            horizontal_space(),
            button("Download all").on_press_maybe((report.successful > 0).then_some(Message::SaveAllBatch)),
        ]
        .align_y(Alignment::Center),
    );

    let cards: Vec<Element<'a, Message>> = report
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let body: Column<'a, Message> = match (&item.outcome, thumbnails.get(index).cloned().flatten()) {
                (BatchOutcome::Success { width, height, .. }, Some(handle)) => column![
                    image(handle).width(Length::Fixed(THUMB_SIZE)),
                    text(format!("{}×{}", width, height)).size(12),
                    button(text("Download").size(12)).on_press(Message::SaveBatchItem(index)),
                ],
                (BatchOutcome::Success { width, height, .. }, None) => column![
                    text(format!("{}×{}", width, height)).size(12),
                    button(text("Download").size(12)).on_press(Message::SaveBatchItem(index)),
                ],
                (BatchOutcome::Failure(error), _) => column![text(format!("✗ {}", error)).size(12)],
            };

            container(
                column![text(item.filename.as_str()).size(13), body.spacing(6)]
                    .spacing(6)
                    .width(Length::Fixed(THUMB_SIZE)),
            )
            .padding(8)
            .style(container::rounded_box)
            .into()
        })
        .collect();

    page.push(Wrap::with_elements(cards).spacing(12.0).line_spacing(12.0)).into()
}

// ========== 3D models page ==========

pub fn models_page<'a>(
    job: Option<&'a GenerationJob>,
    models: &'a [ModelSummary],
    product_name: &'a str,
    image_url: &'a str,
) -> Element<'a, Message> {
    let form = column![
        text("Image to 3D").size(22),
        text_input("Product name", product_name).on_input(Message::ProductNameChanged),
        text_input("Public image URL (leave empty to send the current image)", image_url)
            .on_input(Message::ModelUrlChanged),
        button("Generate 3D model").on_press(Message::Generate3d),
    ]
    .spacing(8);

    let mut page = column![form].spacing(20);

    if let Some(job) = job {
        let mut status = column![
            text(format!("{}: {} ({}%)", job.product_name, job.status, job.progress)).size(14),
            progress_bar(0.0..=100.0, job.progress as f32).height(8.0),
        ]
        .spacing(6);
        if job.is_ready() {
            status = status.push(button("Download GLB").on_press(Message::DownloadModel(job.task_id.clone())));
        }
        page = page.push(status);
    }

    let list = models.iter().fold(column![].spacing(6), |list, model| {
        let created = model.created().unwrap_or_default();
        let download = (model.status == ModelStatus::Succeeded && model.glb_url().is_some())
            .then(|| Message::DownloadModel(model.id.clone()));
        list.push(
            row![
                text(model.id.as_str()).size(13).width(Length::FillPortion(3)),
                text(model.status.to_string()).size(13).width(Length::FillPortion(1)),
                text(created).size(13).width(Length::FillPortion(2)),
                button(text("Download").size(12)).on_press_maybe(download),
            ]
            .spacing(8)
            .align_y(Alignment::Center),
        )
    });

    page.push(
        column![
            row![
                text("Recent models").size(18),
                horizontal_space(),
                button("Refresh").on_press(Message::RefreshModels)
            ]
            .align_y(Alignment::Center),
            list,
        ]
        .spacing(8),
    )
    .into()
}

// ========== Helpers ==========

fn apply<'a>(kind: OperationKind, label: &'a str) -> Element<'a, Message> {
    button(text(label).size(14)).on_press(Message::Apply(kind)).into()
}

fn labeled<'a>(label: &'a str, value: String, control: impl Into<Element<'a, Message>>) -> Element<'a, Message> {
    column![
        row![text(label).size(13), horizontal_space(), text(value).size(13)],
        control.into(),
    ]
    .spacing(2)
    .into()
}
