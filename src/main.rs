use iced::alignment::Horizontal;
use iced::keyboard::{self, key::Named, Key};
use iced::widget::{canvas, column, container, image, row, scrollable, stack, text};
use iced::{event, window, Element, Length, Subscription, Task, Theme};
use rfd::FileDialog;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod color;
mod config;
mod error;
mod export;
mod state;
mod ui;
mod upload;

use api::{BackendStatus, BatchOutcome, BatchReport, GenerationStatus, ModelStatus, ModelSummary, Operation, OperationKind};
use api::{ProcessingClient, RelayClient};
use color::{Background, Rgb};
use config::{BackgroundMode, Settings};
use error::{StudioError, StudioResult, ValidationError};
use state::controls::{Adjust, Controls};
use state::generation::{GenerationTracker, PollOutcome};
use state::picture::Picture;
use state::session::{Phase, Session, SessionError, Slot, Ticket};
use ui::canvas::Display;
use ui::histogram::Histogram;
use ui::notify::Toasts;
use upload::{BatchSelection, Upload};

/// File types offered by the open dialogs
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "gif", "tif", "tiff"];
/// Toast expiry check interval
const TOAST_TICK: Duration = Duration::from_millis(500);

/// Top-level pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Studio,
    Batch,
    Models,
}

/// Where the image for a 3D model comes from
enum ModelSource {
    Url(String),
    Picture(Picture),
}

/// Main application state
struct Studio {
    settings: Settings,
    processing: ProcessingClient,
    relay: RelayClient,
    /// Last status probe; `None` until one succeeds
    backend: Option<BackendStatus>,
    session: Session,
    controls: Controls,
    page: Page,
    /// Status line while a request is out
    /// Requests in flight with their status line
    pending: Vec<(Ticket, String)>,
    display: Option<Display>,
    histogram: Option<Histogram>,
    background: Background,
    custom_open: bool,
    edge_results: Vec<(String, image::Handle)>,
    batch: Option<BatchReport>,
    batch_thumbnails: Vec<Option<image::Handle>>,
    batch_busy: Option<String>,
    generation: GenerationTracker,
    models: Vec<ModelSummary>,
    product_name: String,
    model_image_url: String,
    toasts: Toasts,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    // ========== Backend ==========
    CheckBackend,
    BackendChecked(StudioResult<BackendStatus>),

    // ========== Loading ==========
    OpenFile,
    FileDropped(PathBuf),
    FileOpened(StudioResult<(Upload, Picture)>),

    // ========== Processing ==========
    AutoCropToggled(bool),
    Apply(OperationKind),
    CutoutReady(Ticket, StudioResult<Picture>),
    WorkingReady(Ticket, String, StudioResult<Picture>),
    Adjust(Adjust),
    ResetControls,
    SelectBackground(Background),
    ApplyCustomColor,
    CompareEdges,
    EdgesCompared(Ticket, StudioResult<Vec<(String, Vec<u8>)>>),

    // ========== Session ==========
    ToggleCompare,
    ResetToOriginal,
    ResetToProcessed,
    Back,
    Download,
    Saved(StudioResult<PathBuf>),

    // ========== Batch ==========
    OpenBatch,
    OpenBatchFolder,
    BatchScreened(Result<BatchSelection, ValidationError>),
    BatchDone(StudioResult<BatchReport>),
    SaveBatchItem(usize),
    SaveAllBatch,
    BatchSaved(StudioResult<Vec<PathBuf>>),

    // ========== 3D models ==========
    ProductNameChanged(String),
    ModelUrlChanged(String),
    Generate3d,
    GenerationStarted(StudioResult<(String, String)>),
    PollGeneration,
    Polled(StudioResult<(String, GenerationStatus)>),
    RefreshModels,
    ModelsLoaded(StudioResult<Vec<ModelSummary>>),
    DownloadModel(String),

    ShowPage(Page),
    Tick(Instant),
}

impl Studio {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let studio = Self::with_settings(Settings::load());
        info!(
            "🎨 Stellarion Studio initialized (backend {}, relay {})",
            studio.settings.api_url, studio.settings.relay_url
        );

        let probe = studio.check_backend();
        (studio, probe)
    }

    /// Build the app around explicit settings without starting any task
    fn with_settings(settings: Settings) -> Self {
        let timeout = settings.request_timeout();
        Self {
            processing: ProcessingClient::new(settings.api_url.clone(), settings.upload_limits(), timeout),
            relay: RelayClient::new(settings.relay_url.clone(), timeout),
            settings,
            backend: None,
            session: Session::new(),
            controls: Controls::new(),
            page: Page::Studio,
            pending: Vec::new(),
            display: None,
            histogram: None,
            background: Background::Transparent,
            custom_open: false,
            edge_results: Vec::new(),
            batch: None,
            batch_thumbnails: Vec::new(),
            batch_busy: None,
            generation: GenerationTracker::default(),
            models: Vec::new(),
            product_name: String::new(),
            model_image_url: String::new(),
            toasts: Toasts::default(),
        }
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::CheckBackend => self.check_backend(),
            Message::BackendChecked(result) => {
                match result {
                    Ok(status) if status.is_online() => {
                        self.toasts.success(format!("Connected to backend ({})", status.device));
                        self.backend = Some(status);
                    }
                    Ok(status) => {
                        self.toasts.warning(format!("Backend reports status '{}'", status.api_status));
                        self.backend = Some(status);
                    }
                    Err(e) => {
                        warn!("Backend probe failed: {}", e);
                        self.backend = None;
                        self.toasts.error(StudioError::BackendOffline.to_string());
                    }
                }
                Task::none()
            }

            Message::OpenFile => {
                let file = FileDialog::new()
                    .set_title("Select an image")
                    .add_filter("Images", IMAGE_EXTENSIONS)
                    .pick_file();

                match file {
                    Some(path) => self.open_path(path),
                    None => Task::none(),
                }
            }
            Message::FileDropped(path) => self.open_path(path),
            Message::FileOpened(Ok((source, picture))) => {
                info!("🖼️  Loaded {} ({}×{})", source.filename, picture.width(), picture.height());
                self.page = Page::Studio;
                self.edge_results.clear();
                self.background = Background::Transparent;
                self.custom_open = false;
                self.session.begin(source, picture);
                self.refresh_display();
                self.dispatch_cutout()
            }
            Message::FileOpened(Err(e)) => {
                self.toasts.error(e.to_string());
                Task::none()
            }

            Message::AutoCropToggled(enabled) => {
                self.controls.auto_crop = enabled;
                if self.session.is_empty() {
                    return Task::none();
                }
                self.dispatch_cutout()
            }
            Message::Apply(OperationKind::RemoveBackground) => self.dispatch_cutout(),
            Message::Apply(kind) => {
                let operation = self.controls.to_operation(kind);
                self.dispatch_edit(operation)
            }
            Message::CutoutReady(ticket, result) => {
                if !self.session.is_current(ticket) {
                    debug!("🗑️  Ignoring superseded background removal");
                    return Task::none();
                }
                self.settle(ticket);

                match result {
                    Ok(picture) => match self.session.accept_cutout(ticket, picture).map(|_| ()) {
                        Ok(()) => {
                            if matches!(self.session.phase(), Phase::Processed { .. }) {
                                self.background = Background::Transparent;
                                self.custom_open = false;
                            }
                            self.refresh_display();
                            self.toasts.success("Background removed successfully!");
                        }
                        Err(e) => debug!("Cutout not installed: {}", e),
                    },
                    Err(e) => self.toasts.error(format!("Background removal failed: {}", e)),
                }
                Task::none()
            }
            Message::WorkingReady(ticket, label, result) => {
                if !self.session.is_current(ticket) {
                    debug!("🗑️  Ignoring superseded {}", label);
                    return Task::none();
                }
                self.settle(ticket);

                match result {
                    Ok(picture) => match self.session.accept_working(ticket, picture).map(|_| ()) {
                        Ok(()) => {
                            self.refresh_display();
                            self.toasts.success(format!("{} applied", label));
                        }
                        Err(e) => debug!("Edit not installed: {}", e),
                    },
                    Err(e) => self.toasts.error(format!("{} failed: {}", label, e)),
                }
                Task::none()
            }
            Message::Adjust(change) => {
                self.controls.adjust(change);
                Task::none()
            }
            Message::ResetControls => {
                self.controls.reset();
                Task::none()
            }
            Message::SelectBackground(Background::Transparent) => {
                match self.session.reset_to_processed().map(|_| ()) {
                    Ok(()) => {
                        self.background = Background::Transparent;
                        self.custom_open = false;
                        self.refresh_display();
                    }
                    Err(e) => self.toasts.error(e.to_string()),
                }
                Task::none()
            }
            Message::SelectBackground(Background::Color(rgb)) => {
                self.custom_open = false;
                self.apply_background(rgb)
            }
            Message::SelectBackground(Background::Custom) => {
                if self.session.processed().is_none() {
                    self.toasts.error(SessionError::NoProcessed.to_string());
                } else {
                    self.custom_open = true;
                }
                Task::none()
            }
            Message::ApplyCustomColor => {
                let rgb = self.controls.custom_rgb();
                self.apply_background(rgb)
            }
            Message::CompareEdges => {
                let Some(picture) = self.session.current().cloned() else {
                    self.toasts.error("Please upload an image first");
                    return Task::none();
                };
                if !self.require_backend() {
                    return Task::none();
                }

                let ticket = self.session.issue(Slot::Analysis);
                self.track(ticket, "Comparing edge detectors...");
                Task::perform(compare_edges(self.processing.clone(), picture), move |result| {
                    Message::EdgesCompared(ticket, result)
                })
            }
            Message::EdgesCompared(ticket, result) => {
                if !self.session.is_current(ticket) {
                    return Task::none();
                }
                self.settle(ticket);

                match result {
                    Ok(results) => {
                        self.toasts.success(format!("Compared {} edge detectors", results.len()));
                        self.edge_results = results
                            .into_iter()
                            .map(|(method, bytes)| (method, image::Handle::from_bytes(bytes)))
                            .collect();
                    }
                    Err(e) => self.toasts.error(format!("Edge comparison failed: {}", e)),
                }
                Task::none()
            }

            Message::ToggleCompare => {
                match self.session.toggle_compare() {
                    Ok(_) => self.refresh_display(),
                    Err(e) => self.toasts.error(e.to_string()),
                }
                Task::none()
            }
            Message::ResetToOriginal => {
                match self.session.reset_to_original().map(|_| ()) {
                    Ok(()) => {
                        self.background = Background::Transparent;
                        self.refresh_display();
                    }
                    Err(e) => self.toasts.error(e.to_string()),
                }
                Task::none()
            }
            Message::ResetToProcessed => {
                match self.session.reset_to_processed().map(|_| ()) {
                    Ok(()) => {
                        self.background = Background::Transparent;
                        self.refresh_display();
                    }
                    Err(e) => self.toasts.error(e.to_string()),
                }
                Task::none()
            }
            Message::Back => {
                self.session.clear();
                self.pending.clear();
                self.display = None;
                self.histogram = None;
                self.edge_results.clear();
                self.background = Background::Transparent;
                self.custom_open = false;
                self.page = Page::Studio;
                Task::none()
            }
            Message::Download => {
                let Some(picture) = self.session.displayed().cloned() else {
                    debug!("Nothing to download");
                    return Task::none();
                };
                Task::perform(
                    export::save_picture(self.settings.download_dir(), picture),
                    Message::Saved,
                )
            }
            Message::Saved(result) => {
                match result {
                    Ok(path) => self.toasts.success(format!("Saved {}", path.display())),
                    Err(e) => self.toasts.error(format!("Download failed: {}", e)),
                }
                Task::none()
            }

            Message::OpenBatch => {
                let files = FileDialog::new()
                    .set_title("Select images to process")
                    .add_filter("Images", IMAGE_EXTENSIONS)
                    .pick_files();

                match files {
                    Some(paths) => self.start_batch(paths),
                    None => Task::none(),
                }
            }
            Message::OpenBatchFolder => {
                let folder = FileDialog::new().set_title("Select a folder of images").pick_folder();

                match folder {
                    Some(folder) => {
                        self.page = Page::Batch;
                        let limits = self.settings.upload_limits();
                        Task::perform(
                            async move { upload::screen_batch(upload::collect_folder(&folder), limits).await },
                            Message::BatchScreened,
                        )
                    }
                    None => Task::none(),
                }
            }
            Message::BatchScreened(Ok(selection)) => self.run_selection(selection),
            Message::BatchScreened(Err(e)) => {
                self.toasts.error(e.to_string());
                Task::none()
            }
            Message::BatchDone(result) => {
                self.batch_busy = None;
                match result {
                    Ok(report) => {
                        if report.failed > 0 {
                            self.toasts.warning(format!(
                                "Processed {} of {} images ({} failed)",
                                report.successful, report.total, report.failed
                            ));
                        } else {
                            self.toasts
                                .success(format!("Processed {} of {} images", report.successful, report.total));
                        }
                        self.batch_thumbnails = report
                            .items
                            .iter()
                            .map(|item| match &item.outcome {
                                BatchOutcome::Success { png, .. } => Some(image::Handle::from_bytes(png.clone())),
                                BatchOutcome::Failure(_) => None,
                            })
                            .collect();
                        self.batch = Some(report);
                    }
                    Err(e) if e.is_local() => self.toasts.error(e.to_string()),
                    Err(e) => self.toasts.error(format!("Batch processing failed: {}", e)),
                }
                Task::none()
            }
            Message::SaveBatchItem(index) => {
                let Some(item) = self.batch.as_ref().and_then(|report| report.items.get(index)).cloned() else {
                    return Task::none();
                };
                if let BatchOutcome::Failure(reason) = &item.outcome {
                    self.toasts.error(format!("{} failed: {}", item.filename, reason));
                    return Task::none();
                }
                Task::perform(
                    export::save_batch_item(self.settings.download_dir(), item),
                    |result| Message::BatchSaved(result.map(|saved| saved.into_iter().collect())),
                )
            }
            Message::SaveAllBatch => {
                let Some(report) = &self.batch else {
                    return Task::none();
                };
                self.toasts
                    .info(format!("Downloading {} images...", report.successes().count()));
                Task::perform(
                    export::save_batch(
                        self.settings.download_dir(),
                        report.items.clone(),
                        self.settings.batch_stagger(),
                    ),
                    Message::BatchSaved,
                )
            }
            Message::BatchSaved(result) => {
                match result {
                    Ok(paths) if paths.is_empty() => self.toasts.warning("No processed images to save"),
                    Ok(paths) if paths.len() == 1 => self.toasts.success(format!("Saved {}", paths[0].display())),
                    Ok(paths) => self.toasts.success(format!(
                        "Saved {} images to {}",
                        paths.len(),
                        self.settings.download_dir().display()
                    )),
                    Err(e) => self.toasts.error(format!("Download failed: {}", e)),
                }
                Task::none()
            }

            Message::ProductNameChanged(name) => {
                self.product_name = name;
                Task::none()
            }
            Message::ModelUrlChanged(url) => {
                self.model_image_url = url;
                Task::none()
            }
            Message::Generate3d => {
                let source = if !self.model_image_url.trim().is_empty() {
                    ModelSource::Url(self.model_image_url.trim().to_string())
                } else if let Some(picture) = self.session.current() {
                    ModelSource::Picture(picture.clone())
                } else {
                    self.toasts.error("Load an image or enter an image URL first");
                    return Task::none();
                };

                let product_name = match self.product_name.trim() {
                    "" => "Product".to_string(),
                    name => name.to_string(),
                };
                self.toasts.info("Starting 3D model generation...");
                Task::perform(
                    start_generation(self.relay.clone(), source, product_name),
                    Message::GenerationStarted,
                )
            }
            Message::GenerationStarted(result) => match result {
                Ok((task_id, product_name)) => {
                    self.toasts.success("3D model generation started");
                    self.generation.start(task_id, product_name);
                    self.poll_generation()
                }
                Err(e) => {
                    self.toasts.error(format!("3D model generation failed: {}", e));
                    Task::none()
                }
            },
            Message::PollGeneration => self.poll_generation(),
            Message::Polled(Ok((task_id, status))) => match self.generation.apply(&task_id, status) {
                PollOutcome::Ignored | PollOutcome::Progress => Task::none(),
                PollOutcome::Finished(ModelStatus::Succeeded) => {
                    self.toasts.success("3D model ready");
                    self.list_models()
                }
                PollOutcome::Finished(status) => {
                    self.toasts.error(format!("3D model generation {}", status.to_string().to_lowercase()));
                    Task::none()
                }
            },
            Message::Polled(Err(e)) => {
                self.toasts.warning(format!("Status check failed: {}", e));
                Task::none()
            }
            Message::RefreshModels => self.list_models(),
            Message::ModelsLoaded(result) => {
                match result {
                    Ok(models) => self.models = models,
                    Err(e) => self.toasts.error(format!("Could not load models: {}", e)),
                }
                Task::none()
            }
            Message::DownloadModel(task_id) => {
                self.toasts.info("Downloading 3D model...");
                Task::perform(
                    download_model(self.relay.clone(), task_id, self.settings.download_dir()),
                    Message::Saved,
                )
            }

            Message::ShowPage(page) => {
                self.page = page;
                if page == Page::Models && self.models.is_empty() {
                    return self.list_models();
                }
                Task::none()
            }
            Message::Tick(now) => {
                self.toasts.prune(now);
                Task::none()
            }
        }
    }

    // ========== Dispatch ==========

    fn check_backend(&self) -> Task<Message> {
        Task::perform(self.processing.clone().status(), Message::BackendChecked)
    }

    /// Processing is refused locally unless the last probe said "online"
    fn require_backend(&mut self) -> bool {
        let online = self.backend.as_ref().is_some_and(BackendStatus::is_online);
        if !online {
            self.toasts.error(StudioError::BackendOffline.to_string());
        }
        online
    }

    /// Show a status line until `ticket` settles or is superseded
    fn track(&mut self, ticket: Ticket, label: impl Into<String>) {
        let session = &self.session;
        self.pending.retain(|(t, _)| session.is_current(*t));
        self.pending.push((ticket, label.into()));
    }

    fn settle(&mut self, ticket: Ticket) {
        let session = &self.session;
        self.pending.retain(|(t, _)| *t != ticket && session.is_current(*t));
    }

    /// Status lines of requests that can still land
    fn busy_line(&self) -> Option<String> {
        let labels: Vec<&str> = self
            .pending
            .iter()
            .filter(|(ticket, _)| self.session.is_current(*ticket))
            .map(|(_, label)| label.as_str())
            .collect();
        (!labels.is_empty()).then(|| labels.join("  "))
    }

    fn open_path(&mut self, path: PathBuf) -> Task<Message> {
        Task::perform(open_image(path, self.settings.upload_limits()), Message::FileOpened)
    }

    /// Background removal of the held upload
    fn dispatch_cutout(&mut self) -> Task<Message> {
        let Some(source) = self.session.source().cloned() else {
            self.toasts.error("Please upload an image first");
            return Task::none();
        };
        if !self.require_backend() {
            return Task::none();
        }

        let ticket = self.session.issue(Slot::Cutout);
        let operation = self.controls.remove_background(None);
        self.track(ticket, "Removing background...");
        Task::perform(process_upload(self.processing.clone(), source, operation), move |result| {
            Message::CutoutReady(ticket, result)
        })
    }

    /// Run an operation on the current picture
    fn dispatch_edit(&mut self, operation: Operation) -> Task<Message> {
        let Some(picture) = self.session.current().cloned() else {
            self.toasts.error("Please upload an image first");
            return Task::none();
        };
        if !self.require_backend() {
            return Task::none();
        }

        let ticket = self.session.issue(Slot::Working);
        let label = operation.describe();
        self.track(ticket, format!("{}...", label));
        Task::perform(process_picture(self.processing.clone(), picture, operation), move |result| {
            Message::WorkingReady(ticket, label.clone(), result)
        })
    }

    /// Put a flat color behind the processed picture
    fn apply_background(&mut self, rgb: Rgb) -> Task<Message> {
        let Some(processed) = self.session.processed().cloned() else {
            self.toasts.error(SessionError::NoProcessed.to_string());
            return Task::none();
        };
        let label = format!("Background {}", rgb);

        match self.settings.background_mode {
            BackgroundMode::Local => {
                self.background = Background::Color(rgb);
                let ticket = self.session.issue(Slot::Working);
                self.track(ticket, format!("{}...", label));
                Task::perform(color::composite_async(processed, rgb), move |result| {
                    Message::WorkingReady(ticket, label.clone(), result)
                })
            }
            BackgroundMode::Remote => {
                let Some(source) = self.session.source().cloned() else {
                    return Task::none();
                };
                if !self.require_backend() {
                    return Task::none();
                }
                self.background = Background::Color(rgb);
                let ticket = self.session.issue(Slot::Working);
                let operation = self.controls.remove_background(Some(rgb));
                self.track(ticket, format!("{}...", label));
                Task::perform(process_upload(self.processing.clone(), source, operation), move |result| {
                    Message::WorkingReady(ticket, label.clone(), result)
                })
            }
        }
    }

    fn start_batch(&mut self, paths: Vec<PathBuf>) -> Task<Message> {
        self.page = Page::Batch;
        Task::perform(
            upload::screen_batch(paths, self.settings.upload_limits()),
            Message::BatchScreened,
        )
    }

    fn run_selection(&mut self, selection: BatchSelection) -> Task<Message> {
        if !selection.skipped.is_empty() {
            self.toasts
                .warning(format!("Skipped {} invalid file(s)", selection.skipped.len()));
        }
        if !self.require_backend() {
            return Task::none();
        }

        self.batch = None;
        self.batch_thumbnails.clear();
        self.batch_busy = Some(format!("Processing {} images...", selection.accepted.len()));
        Task::perform(run_batch(self.processing.clone(), selection), Message::BatchDone)
    }

    fn poll_generation(&self) -> Task<Message> {
        match self.generation.pending_task() {
            Some(task_id) => Task::perform(self.relay.clone().check_status(task_id.to_string()), Message::Polled),
            None => Task::none(),
        }
    }

    fn list_models(&self) -> Task<Message> {
        Task::perform(self.relay.clone().list_models(), Message::ModelsLoaded)
    }

    /// Rebuild the display only when the shown picture actually changed
    fn refresh_display(&mut self) {
        match self.session.displayed() {
            Some(picture) if self.display.as_ref().is_some_and(|d| d.shows(picture)) => {}
            Some(picture) => {
                self.histogram = Some(Histogram::from_image(picture.rgba()));
                self.display = Some(Display::new(
                    picture.clone(),
                    self.settings.viewport_width,
                    self.settings.viewport_height,
                ));
            }
            None => {
                self.display = None;
                self.histogram = None;
            }
        }
    }

    // ========== View ==========

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let body = match self.page {
            Page::Studio => self.studio_view(),
            Page::Batch => ui::panels::batch_page(
                self.batch.as_ref(),
                &self.batch_thumbnails,
                self.batch_busy.as_deref(),
            ),
            Page::Models => ui::panels::models_page(
                self.generation.job(),
                &self.models,
                &self.product_name,
                &self.model_image_url,
            ),
        };

        let main = column![
            ui::panels::header(self.page, self.backend.as_ref()),
            container(scrollable(container(body).padding(16)))
                .width(Length::Fill)
                .height(Length::Fill),
        ];

        let toasts = container(self.toasts.view())
            .width(Length::Fill)
            .align_x(Horizontal::Right)
            .padding(16);

        stack![main, toasts].into()
    }

    fn studio_view(&self) -> Element<Message> {
        let Some(display) = &self.display else {
            return ui::panels::upload_prompt(self.settings.upload_limits());
        };

        let width = Length::Fixed(display.size.0 as f32);
        let mut picture = column![
            ui::panels::toolbar(&self.session, self.busy_line()),
            display.view(),
            text(format!("{}×{}", display.picture.width(), display.picture.height())).size(12),
        ]
        .spacing(12);

        if let Some(histogram) = self.histogram.as_ref().filter(|h| !h.is_empty()) {
            picture = picture.push(canvas(histogram).width(width).height(Length::Fixed(100.0)));
        }
        if !self.edge_results.is_empty() {
            picture = picture.push(ui::panels::edge_grid(&self.edge_results));
        }

        let side = column![
            ui::panels::background_section(self.background, self.custom_open, &self.controls),
            ui::panels::editing_panel(&self.controls),
        ]
        .spacing(24);

        row![picture, side].spacing(24).into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }

    fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![
            keyboard::on_key_press(shortcut),
            event::listen_with(|event, _status, _window| match event {
                iced::Event::Window(window::Event::FileDropped(path)) => Some(Message::FileDropped(path)),
                _ => None,
            }),
        ];

        if !self.toasts.is_empty() {
            subscriptions.push(iced::time::every(TOAST_TICK).map(Message::Tick));
        }
        if self.generation.pending_task().is_some() {
            subscriptions.push(iced::time::every(self.settings.poll_interval()).map(|_| Message::PollGeneration));
        }

        Subscription::batch(subscriptions)
    }
}

/// Escape goes back, Space compares, `d` downloads
fn shortcut(key: Key, modifiers: keyboard::Modifiers) -> Option<Message> {
    if modifiers.command() || modifiers.alt() {
        return None;
    }
    match key.as_ref() {
        Key::Named(Named::Escape) => Some(Message::Back),
        Key::Named(Named::Space) => Some(Message::ToggleCompare),
        Key::Character("d") | Key::Character("D") => Some(Message::Download),
        _ => None,
    }
}

// ========== Async work ==========

async fn open_image(path: PathBuf, limits: upload::UploadLimits) -> StudioResult<(Upload, Picture)> {
    let source = Upload::open(path, limits).await?;
    let picture = Picture::decode_async(source.bytes.clone()).await?;
    Ok((source, picture))
}

async fn process_upload(client: ProcessingClient, source: Upload, operation: Operation) -> StudioResult<Picture> {
    let bytes = client.process(source, operation).await?;
    Picture::decode_async(bytes).await
}

/// Re-upload a picture as full-resolution PNG and run `operation` on it
async fn process_picture(client: ProcessingClient, picture: Picture, operation: Operation) -> StudioResult<Picture> {
    let png = picture.encode_png_async().await?;
    process_upload(client, Upload::png(png), operation).await
}

async fn compare_edges(client: ProcessingClient, picture: Picture) -> StudioResult<Vec<(String, Vec<u8>)>> {
    let png = picture.encode_png_async().await?;
    client.compare_edge_detectors(Upload::png(png)).await
}

async fn run_batch(client: ProcessingClient, selection: BatchSelection) -> StudioResult<BatchReport> {
    let uploads = upload::read_batch(selection).await?;
    client.batch_process(uploads).await
}

async fn start_generation(
    relay: RelayClient,
    source: ModelSource,
    product_name: String,
) -> StudioResult<(String, String)> {
    let image_url = match source {
        ModelSource::Url(url) => url,
        ModelSource::Picture(picture) => api::encode_data_url("image/png", &picture.encode_png_async().await?),
    };
    let task_id = relay.create_3d_model(image_url, product_name.clone()).await?;
    Ok((task_id, product_name))
}

async fn download_model(relay: RelayClient, task_id: String, dir: PathBuf) -> StudioResult<PathBuf> {
    let (task_id, glb) = relay.download_model(task_id).await?;
    export::save_model(dir, task_id, glb).await
}

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wgpu_core=warn,wgpu_hal=warn,naga=warn,iced_wgpu=warn")),
        )
        .with_target(false)
        .compact()
        .init();

    iced::application("Stellarion Studio", Studio::update, Studio::view)
        .theme(Studio::theme)
        .subscription(Studio::subscription)
        .centered()
        .run_with(Studio::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{Rgba, RgbaImage};
    use ui::notify::Level;

    fn studio() -> Studio {
        Studio::with_settings(Settings::default())
    }

    fn online() -> BackendStatus {
        BackendStatus {
            api_status: "online".into(),
            device: "cpu".into(),
            ..Default::default()
        }
    }

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> Picture {
        Picture::from_rgba(RgbaImage::from_pixel(w, h, Rgba(rgba)))
    }

    fn loaded(studio: &mut Studio) -> Picture {
        let original = solid(1600, 900, [200, 100, 50, 255]);
        let _ = studio.update(Message::FileOpened(Ok((Upload::png(vec![1, 2, 3]), original.clone()))));
        original
    }

    fn last_level(studio: &Studio) -> Option<Level> {
        studio.toasts.last().map(|t| t.level)
    }

    #[test]
    fn test_load_fits_display_and_refuses_offline_backend() {
        let mut studio = studio();
        let original = loaded(&mut studio);

        let display = studio.display.as_ref().unwrap();
        assert!(display.shows(&original));
        assert_eq!(display.size, (800, 450));

        // No probe succeeded, so background removal was refused locally
        assert_eq!(last_level(&studio), Some(Level::Error));
        assert!(studio.toasts.last().unwrap().message.contains("Backend server is not running"));
        assert!(studio.busy_line().is_none());
    }

    #[test]
    fn test_compare_without_processed_is_an_error_and_keeps_display() {
        let mut studio = studio();
        let original = loaded(&mut studio);

        let _ = studio.update(Message::ToggleCompare);

        assert_eq!(studio.toasts.last().unwrap().message, "No comparison available yet");
        assert!(studio.display.as_ref().unwrap().shows(&original));
        assert!(!studio.session.is_comparing());
    }

    #[test]
    fn test_background_preset_without_processed_is_an_error() {
        let mut studio = studio();
        let original = loaded(&mut studio);

        let _ = studio.update(Message::SelectBackground(Background::Color(Rgb::BLACK)));
        assert_eq!(studio.toasts.last().unwrap().message, "No processed image available");
        assert!(studio.display.as_ref().unwrap().shows(&original));
        assert_eq!(studio.background, Background::Transparent);

        let _ = studio.update(Message::SelectBackground(Background::Transparent));
        assert_eq!(last_level(&studio), Some(Level::Error));
        assert!(studio.display.as_ref().unwrap().shows(&original));
    }

    #[test]
    fn test_cutout_result_replaces_display() {
        let mut studio = studio();
        studio.backend = Some(online());
        loaded(&mut studio);
        let ticket = studio.session.issue(Slot::Cutout);

        let cutout = solid(400, 300, [0, 0, 0, 0]);
        let _ = studio.update(Message::CutoutReady(ticket, Ok(cutout.clone())));

        assert!(studio.display.as_ref().unwrap().shows(&cutout));
        assert_eq!(studio.display.as_ref().unwrap().size, (400, 300));
        assert_eq!(last_level(&studio), Some(Level::Success));

        let _ = studio.update(Message::ToggleCompare);
        assert!(studio.session.is_comparing());
        assert!(!studio.display.as_ref().unwrap().shows(&cutout));
    }

    #[test]
    fn test_stale_background_color_is_discarded() {
        let mut studio = studio();
        studio.backend = Some(online());
        loaded(&mut studio);
        let cut = studio.session.issue(Slot::Cutout);
        let _ = studio.update(Message::CutoutReady(cut, Ok(solid(4, 4, [0, 0, 0, 0]))));

        let red_ticket = studio.session.issue(Slot::Working);
        let green_ticket = studio.session.issue(Slot::Working);
        let red = solid(4, 4, [255, 0, 0, 255]);
        let green = solid(4, 4, [0, 255, 0, 255]);

        let _ = studio.update(Message::WorkingReady(green_ticket, "green".into(), Ok(green.clone())));
        let _ = studio.update(Message::WorkingReady(red_ticket, "red".into(), Ok(red)));

        assert!(studio.display.as_ref().unwrap().shows(&green));
    }

    #[test]
    fn test_back_drops_everything_and_late_results() {
        let mut studio = studio();
        studio.backend = Some(online());
        loaded(&mut studio);
        let ticket = studio.session.issue(Slot::Cutout);

        let _ = studio.update(Message::Back);
        let _ = studio.update(Message::CutoutReady(ticket, Ok(solid(4, 4, [0; 4]))));

        assert!(studio.session.is_empty());
        assert!(studio.display.is_none());
        assert!(studio.histogram.is_none());
    }

    #[test]
    fn test_failed_request_leaves_state_untouched() {
        let mut studio = studio();
        studio.backend = Some(online());
        let original = loaded(&mut studio);
        let ticket = studio.session.issue(Slot::Working);

        let err = StudioError::Server {
            status: 500,
            message: "boom".into(),
        };
        let _ = studio.update(Message::WorkingReady(ticket, "Enhancement".into(), Err(err)));

        assert!(studio.display.as_ref().unwrap().shows(&original));
        assert!(studio.toasts.last().unwrap().message.contains("boom"));
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let mut studio = studio();
        let err = error::ValidationError::NotAnImage {
            filename: "a.txt".into(),
            mime: "text/plain".into(),
        };
        let _ = studio.update(Message::FileOpened(Err(err.into())));

        assert!(studio.session.is_empty());
        assert!(studio.toasts.last().unwrap().message.contains("valid image"));
    }

    #[test]
    fn test_shortcuts() {
        let none = keyboard::Modifiers::empty();
        assert!(matches!(shortcut(Key::Named(Named::Escape), none), Some(Message::Back)));
        assert!(matches!(shortcut(Key::Named(Named::Space), none), Some(Message::ToggleCompare)));
        assert!(matches!(shortcut(Key::Character("d".into()), none), Some(Message::Download)));
        assert!(shortcut(Key::Character("d".into()), keyboard::Modifiers::CTRL).is_none());
    }

    #[test]
    fn test_download_shortcut_ignored_without_image() {
        let mut studio = studio();
        let _ = studio.update(Message::Download);
        assert!(studio.toasts.is_empty());
    }

    #[test]
    fn test_polls_for_replaced_job_are_ignored() {
        let mut studio = studio();
        studio.generation.start("current".into(), "Mug".into());
        let stale = GenerationStatus {
            status: ModelStatus::Succeeded,
            progress: 100,
            model_url: None,
            thumbnail_url: None,
        };

        let _ = studio.update(Message::Polled(Ok(("previous".into(), stale))));
        assert_eq!(studio.generation.job().unwrap().status, ModelStatus::Pending);
        assert!(studio.toasts.is_empty());
    }

    #[test]
    fn test_late_cutout_does_not_replace_newer_edit() {
        let mut studio = studio();
        studio.backend = Some(online());
        loaded(&mut studio);
        let cutout_ticket = studio.pending[0].0;

        let _ = studio.update(Message::Apply(OperationKind::Enhance));
        let edit_ticket = studio.pending.last().unwrap().0;
        let enhanced = solid(400, 300, [6, 6, 6, 255]);
        let _ = studio.update(Message::WorkingReady(edit_ticket, "Enhancement".into(), Ok(enhanced.clone())));
        let _ = studio.update(Message::CutoutReady(cutout_ticket, Ok(solid(400, 300, [0; 4]))));

        assert!(studio.display.as_ref().unwrap().shows(&enhanced));
        assert!(studio.session.processed().is_some());
    }

    #[test]
    fn test_status_line_outlives_other_requests() {
        let mut studio = studio();
        studio.backend = Some(online());
        loaded(&mut studio);
        assert_eq!(studio.busy_line().as_deref(), Some("Removing background..."));

        let _ = studio.update(Message::Apply(OperationKind::Enhance));
        let edit_ticket = studio.pending.last().unwrap().0;
        let _ = studio.update(Message::WorkingReady(edit_ticket, "Enhancement".into(), Ok(solid(4, 4, [1; 4]))));

        assert_eq!(studio.busy_line().as_deref(), Some("Removing background..."));
    }

    #[test]
    fn test_superseded_edit_drops_its_status_line() {
        let mut studio = studio();
        studio.backend = Some(online());
        loaded(&mut studio);
        let cutout_ticket = studio.pending[0].0;
        let _ = studio.update(Message::CutoutReady(cutout_ticket, Ok(solid(4, 4, [0; 4]))));
        assert!(studio.busy_line().is_none());

        let _ = studio.update(Message::Apply(OperationKind::Enhance));
        let (edit_ticket, edit_label) = studio.pending.last().cloned().unwrap();

        let _ = studio.update(Message::SelectBackground(Background::Color(Rgb::BLACK)));
        let line = studio.busy_line().unwrap();
        assert!(!line.contains(&edit_label));

        let (color_ticket, _) = studio.pending.last().cloned().unwrap();
        let black = solid(4, 4, [0, 0, 0, 255]);
        let _ = studio.update(Message::WorkingReady(color_ticket, "Background".into(), Ok(black.clone())));
        let _ = studio.update(Message::WorkingReady(edit_ticket, "Enhancement".into(), Ok(solid(4, 4, [9; 4]))));

        assert!(studio.busy_line().is_none());
        assert!(studio.display.as_ref().unwrap().shows(&black));
    }

    #[test]
    fn test_refused_remote_background_keeps_selection() {
        let mut studio = Studio::with_settings(Settings {
            background_mode: BackgroundMode::Remote,
            ..Settings::default()
        });
        loaded(&mut studio);
        let ticket = studio.session.issue(Slot::Cutout);
        let _ = studio.update(Message::CutoutReady(ticket, Ok(solid(4, 4, [0; 4]))));

        let _ = studio.update(Message::SelectBackground(Background::Color(Rgb::BLACK)));

        assert_eq!(studio.background, Background::Transparent);
        assert!(studio.toasts.last().unwrap().message.contains("Backend server is not running"));
    }

    #[test]
    fn test_failed_batch_item_is_not_saved() {
        let mut studio = studio();
        studio.batch = Some(BatchReport {
            total: 1,
            successful: 0,
            failed: 1,
            items: vec![api::BatchItem {
                filename: "broken.png".into(),
                outcome: BatchOutcome::Failure("Invalid image".into()),
            }],
        });

        let _ = studio.update(Message::SaveBatchItem(0));
        assert_eq!(last_level(&studio), Some(Level::Error));
        assert!(studio.toasts.last().unwrap().message.contains("broken.png"));

        let _ = studio.update(Message::BatchSaved(Ok(Vec::new())));
        assert_eq!(last_level(&studio), Some(Level::Warning));
        assert!(studio.toasts.iter().all(|t| t.level != Level::Success));
    }

    #[test]
    fn test_screened_batch_reports_skips_then_checks_backend() {
        let mut studio = studio();
        let selection = BatchSelection {
            accepted: vec![PathBuf::from("a.png")],
            skipped: vec![(
                PathBuf::from("gone.png"),
                ValidationError::Unreadable {
                    filename: "gone.png".into(),
                    reason: "No such file or directory".into(),
                },
            )],
        };

        let _ = studio.update(Message::BatchScreened(Ok(selection)));

        let levels: Vec<Level> = studio.toasts.iter().map(|t| t.level).collect();
        assert_eq!(levels, vec![Level::Warning, Level::Error]);
        assert!(studio.batch_busy.is_none());
    }
}
