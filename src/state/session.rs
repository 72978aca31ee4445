/// Editing session
///
/// One explicit object holds every image role the UI works with. The phase
/// enum makes impossible combinations unrepresentable: there is no way to be
/// "comparing" without both an original and a processed picture.
///
/// Responses arrive in whatever order the network delivers them, so every
/// dispatch takes a `Ticket` and a result is only installed while its ticket
/// is still the latest one issued for that slot.

use thiserror::Error;
use tracing::debug;

use super::picture::Picture;
use crate::upload::Upload;

/// Which role a request will write when it completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Background removal of the source upload
    Cutout,
    /// Everything applied on top: enhance, filters, background colors
    Working,
    /// Side results that never replace a role (edge detector comparison)
    Analysis,
}

impl Slot {
    fn index(self) -> usize {
        match self {
            Slot::Cutout => 0,
            Slot::Working => 1,
            Slot::Analysis => 2,
        }
    }
}

/// Proof of dispatch order, handed back with the response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub slot: Slot,
    pub seq: u64,
}

/// Monotonic request numbering, one "latest" per slot
#[derive(Debug, Default)]
pub struct Sequencer {
    counter: u64,
    latest: [u64; 3],
}

impl Sequencer {
    /// Issue the next ticket for a slot.
    ///
    /// A new cutout replaces the base every working edit was built on, so it
    /// also supersedes working requests still in flight.
    pub fn issue(&mut self, slot: Slot) -> Ticket {
        self.counter += 1;
        self.latest[slot.index()] = self.counter;
        if slot == Slot::Cutout {
            self.latest[Slot::Working.index()] = self.counter;
        }
        Ticket {
            slot,
            seq: self.counter,
        }
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest[ticket.slot.index()] == ticket.seq
    }

    /// Sequence number of the most recent ticket of any slot
    pub fn last_issued(&self) -> u64 {
        self.counter
    }

    /// Make every outstanding ticket stale
    pub fn invalidate_all(&mut self) {
        self.counter += 1;
        self.latest = [self.counter; 3];
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A newer request for the same slot was issued after this one
    #[error("Discarded an out-of-date response")]
    Stale,
    #[error("No image available")]
    NoImage,
    #[error("No processed image available")]
    NoProcessed,
    #[error("No comparison available yet")]
    NoComparison,
}

/// Image roles by phase
#[derive(Debug, Clone, Default)]
pub enum Phase {
    /// Nothing loaded
    #[default]
    Empty,
    /// Source decoded, background removal pending or failed
    Original { source: Upload, original: Picture },
    /// Background removed; the working picture is the processed one
    Processed {
        source: Upload,
        original: Picture,
        processed: Picture,
        comparing: bool,
    },
    /// Working picture differs from the processed one
    Edited {
        source: Upload,
        original: Picture,
        /// `None` when edits started before background removal succeeded
        processed: Option<Picture>,
        working: Picture,
        comparing: bool,
    },
}

/// What the display should show after a transition
pub type Shown<'a> = Option<&'a Picture>;

#[derive(Debug, Default)]
pub struct Session {
    phase: Phase,
    sequencer: Sequencer,
    /// Dispatch order of the working picture; cutouts issued before it only refresh `processed`
    working_since: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.phase, Phase::Empty)
    }

    // ========== Roles ==========

    pub fn source(&self) -> Option<&Upload> {
        match &self.phase {
            Phase::Empty => None,
            Phase::Original { source, .. }
            | Phase::Processed { source, .. }
            | Phase::Edited { source, .. } => Some(source),
        }
    }

    pub fn original(&self) -> Option<&Picture> {
        match &self.phase {
            Phase::Empty => None,
            Phase::Original { original, .. }
            | Phase::Processed { original, .. }
            | Phase::Edited { original, .. } => Some(original),
        }
    }

    pub fn processed(&self) -> Option<&Picture> {
        match &self.phase {
            Phase::Processed { processed, .. } => Some(processed),
            Phase::Edited { processed, .. } => processed.as_ref(),
            _ => None,
        }
    }

    /// The picture the next operation works on
    pub fn current(&self) -> Option<&Picture> {
        match &self.phase {
            Phase::Empty => None,
            Phase::Original { original, .. } => Some(original),
            Phase::Processed { processed, .. } => Some(processed),
            Phase::Edited { working, .. } => Some(working),
        }
    }

    pub fn is_comparing(&self) -> bool {
        matches!(
            self.phase,
            Phase::Processed { comparing: true, .. } | Phase::Edited { comparing: true, .. }
        )
    }

    /// The picture on the canvas
    pub fn displayed(&self) -> Shown<'_> {
        if self.is_comparing() {
            self.original()
        } else {
            self.current()
        }
    }

    // ========== Requests ==========

    pub fn issue(&mut self, slot: Slot) -> Ticket {
        let ticket = self.sequencer.issue(slot);
        debug!("🎫 Issued {:?} ticket #{}", ticket.slot, ticket.seq);
        ticket
    }

    /// Whether a response for `ticket` would still be installed
    pub fn is_current(&self, ticket: Ticket) -> bool {
        !self.is_empty() && self.sequencer.is_current(ticket)
    }

    fn check(&self, ticket: Ticket) -> Result<(), SessionError> {
        if !self.sequencer.is_current(ticket) {
            debug!("🗑️  Dropping stale {:?} response #{}", ticket.slot, ticket.seq);
            return Err(SessionError::Stale);
        }
        if self.is_empty() {
            return Err(SessionError::NoImage);
        }
        Ok(())
    }

    // ========== Transitions ==========

    /// A new source file was decoded. Everything in flight becomes stale.
    pub fn begin(&mut self, source: Upload, original: Picture) -> Shown<'_> {
        self.sequencer.invalidate_all();
        self.working_since = 0;
        self.phase = Phase::Original { source, original };
        self.displayed()
    }

    /// Install a background-removal result.
    ///
    /// An edit dispatched after this cutout already owns the working picture,
    /// so the cutout then only fills in the processed role.
    pub fn accept_cutout(&mut self, ticket: Ticket, picture: Picture) -> Result<Shown<'_>, SessionError> {
        self.check(ticket)?;
        if let Phase::Edited { processed, .. } = &mut self.phase {
            if self.working_since > ticket.seq {
                debug!("✂️  Cutout #{} kept behind newer edit #{}", ticket.seq, self.working_since);
                *processed = Some(picture);
                return Ok(self.displayed());
            }
        }

        let (source, original) = self.take_base()?;
        self.phase = Phase::Processed {
            source,
            original,
            processed: picture,
            comparing: false,
        };
        Ok(self.displayed())
    }

    /// Install an edit result as the working picture
    pub fn accept_working(&mut self, ticket: Ticket, picture: Picture) -> Result<Shown<'_>, SessionError> {
        self.check(ticket)?;
        let processed = self.processed().cloned();
        let (source, original) = self.take_base()?;
        self.phase = Phase::Edited {
            source,
            original,
            processed,
            working: picture,
            comparing: false,
        };
        self.working_since = ticket.seq;
        Ok(self.displayed())
    }

    /// Flip between original and working. Returns whether the original is now shown.
    pub fn toggle_compare(&mut self) -> Result<bool, SessionError> {
        match &mut self.phase {
            Phase::Processed { comparing, .. }
            | Phase::Edited {
                processed: Some(_),
                comparing,
                ..
            } => {
                *comparing = !*comparing;
                Ok(*comparing)
            }
            _ => Err(SessionError::NoComparison),
        }
    }

    /// Back to the transparent background-removal result
    pub fn reset_to_processed(&mut self) -> Result<Shown<'_>, SessionError> {
        let processed = self.processed().cloned().ok_or(SessionError::NoProcessed)?;
        let (source, original) = self.take_base()?;
        self.phase = Phase::Processed {
            source,
            original,
            processed,
            comparing: false,
        };
        Ok(self.displayed())
    }

    /// Work on the untouched original again (the processed result is kept)
    pub fn reset_to_original(&mut self) -> Result<Shown<'_>, SessionError> {
        let processed = self.processed().cloned();
        let (source, original) = self.take_base().map_err(|_| SessionError::NoImage)?;
        self.phase = match processed {
            Some(processed) => Phase::Edited {
                source,
                working: original.clone(),
                original,
                processed: Some(processed),
                comparing: false,
            },
            None => Phase::Original { source, original },
        };
        self.working_since = self.sequencer.last_issued();
        Ok(self.displayed())
    }

    /// Back button: drop every role and every pending response
    pub fn clear(&mut self) {
        self.sequencer.invalidate_all();
        self.working_since = 0;
        self.phase = Phase::Empty;
    }

    fn take_base(&self) -> Result<(Upload, Picture), SessionError> {
        match (self.source(), self.original()) {
            (Some(source), Some(original)) => Ok((source.clone(), original.clone())),
            _ => Err(SessionError::NoImage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> Picture {
        Picture::from_rgba(RgbaImage::from_pixel(w, h, Rgba(rgba)))
    }

    fn loaded() -> (Session, Picture) {
        let mut session = Session::new();
        let original = solid(4, 4, [9, 9, 9, 255]);
        session.begin(Upload::png(vec![1, 2, 3]), original.clone());
        (session, original)
    }

    fn processed() -> (Session, Picture, Picture) {
        let (mut session, original) = loaded();
        let cutout = solid(4, 4, [0, 0, 0, 0]);
        let ticket = session.issue(Slot::Cutout);
        session.accept_cutout(ticket, cutout.clone()).unwrap();
        (session, original, cutout)
    }

    #[test]
    fn test_starts_empty() {
        let session = Session::new();
        assert!(session.is_empty());
        assert!(session.displayed().is_none());
    }

    #[test]
    fn test_load_shows_original() {
        let (session, original) = loaded();
        assert!(session.displayed().unwrap().same_as(&original));
        assert!(session.processed().is_none());
    }

    #[test]
    fn test_cutout_becomes_current() {
        let (session, _, cutout) = processed();
        assert!(session.current().unwrap().same_as(&cutout));
        assert!(matches!(session.phase(), Phase::Processed { .. }));
    }

    #[test]
    fn test_compare_requires_processed() {
        let (mut session, original) = loaded();
        assert_eq!(session.toggle_compare(), Err(SessionError::NoComparison));
        // Display untouched
        assert!(session.displayed().unwrap().same_as(&original));
        assert!(!session.is_comparing());
    }

    #[test]
    fn test_compare_flips_display() {
        let (mut session, original, cutout) = processed();
        assert_eq!(session.toggle_compare(), Ok(true));
        assert!(session.displayed().unwrap().same_as(&original));
        assert_eq!(session.toggle_compare(), Ok(false));
        assert!(session.displayed().unwrap().same_as(&cutout));
    }

    #[test]
    fn test_last_applied_background_wins_in_order() {
        let (mut session, _, _) = processed();
        let red = solid(4, 4, [255, 0, 0, 255]);
        let green = solid(4, 4, [0, 255, 0, 255]);

        let t_red = session.issue(Slot::Working);
        session.accept_working(t_red, red).unwrap();
        let t_green = session.issue(Slot::Working);
        session.accept_working(t_green, green).unwrap();

        let shown = session.displayed().unwrap();
        assert_eq!(shown.rgba().get_pixel(0, 0), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_overtaken_response_is_discarded() {
        let (mut session, _, _) = processed();
        let red = solid(4, 4, [255, 0, 0, 255]);
        let green = solid(4, 4, [0, 255, 0, 255]);

        let t_red = session.issue(Slot::Working);
        let t_green = session.issue(Slot::Working);

        // Green arrives first, red straggles in afterwards
        session.accept_working(t_green, green.clone()).unwrap();
        assert_eq!(session.accept_working(t_red, red).unwrap_err(), SessionError::Stale);
        assert!(session.displayed().unwrap().same_as(&green));
    }

    #[test]
    fn test_new_cutout_supersedes_pending_edits() {
        let (mut session, _, _) = processed();
        let edit = session.issue(Slot::Working);
        let redo = session.issue(Slot::Cutout);

        session.accept_cutout(redo, solid(4, 4, [1, 1, 1, 0])).unwrap();
        assert_eq!(
            session.accept_working(edit, solid(4, 4, [2, 2, 2, 255])).unwrap_err(),
            SessionError::Stale
        );
    }

    #[test]
    fn test_back_discards_in_flight_results() {
        let (mut session, _) = loaded();
        let ticket = session.issue(Slot::Cutout);
        session.clear();

        assert!(session.is_empty());
        assert_eq!(
            session.accept_cutout(ticket, solid(4, 4, [0; 4])).unwrap_err(),
            SessionError::Stale
        );
        assert!(session.is_empty());
    }

    #[test]
    fn test_new_file_discards_previous_requests() {
        let (mut session, _) = loaded();
        let ticket = session.issue(Slot::Cutout);
        let second = solid(8, 8, [5, 5, 5, 255]);
        session.begin(Upload::png(vec![9]), second.clone());

        assert!(session.accept_cutout(ticket, solid(4, 4, [0; 4])).is_err());
        assert!(session.displayed().unwrap().same_as(&second));
    }

    #[test]
    fn test_edit_before_cutout_keeps_processed_empty() {
        let (mut session, _) = loaded();
        let ticket = session.issue(Slot::Working);
        session.accept_working(ticket, solid(4, 4, [7, 7, 7, 255])).unwrap();

        assert!(session.processed().is_none());
        assert_eq!(session.toggle_compare(), Err(SessionError::NoComparison));
        assert_eq!(session.reset_to_processed().unwrap_err(), SessionError::NoProcessed);
    }

    #[test]
    fn test_resets() {
        let (mut session, original, cutout) = processed();
        let ticket = session.issue(Slot::Working);
        session.accept_working(ticket, solid(4, 4, [3, 3, 3, 255])).unwrap();

        session.reset_to_original().unwrap();
        assert!(session.current().unwrap().same_as(&original));
        assert!(session.processed().unwrap().same_as(&cutout));

        session.reset_to_processed().unwrap();
        assert!(session.current().unwrap().same_as(&cutout));
    }

    #[test]
    fn test_accepting_a_result_ends_compare() {
        let (mut session, _, _) = processed();
        session.toggle_compare().unwrap();
        let ticket = session.issue(Slot::Working);
        let edit = solid(4, 4, [4, 4, 4, 255]);
        session.accept_working(ticket, edit.clone()).unwrap();

        assert!(!session.is_comparing());
        assert!(session.displayed().unwrap().same_as(&edit));
    }

    #[test]
    fn test_analysis_tickets_are_independent() {
        let (mut session, _, _) = processed();
        let analysis = session.issue(Slot::Analysis);
        session.issue(Slot::Working);
        assert!(session.is_current(analysis));

        session.clear();
        assert!(!session.is_current(analysis));
    }

    #[test]
    fn test_late_cutout_keeps_newer_edit() {
        let (mut session, _) = loaded();
        let cutout_ticket = session.issue(Slot::Cutout);
        let edit_ticket = session.issue(Slot::Working);

        let enhanced = solid(4, 4, [6, 6, 6, 255]);
        session.accept_working(edit_ticket, enhanced.clone()).unwrap();
        let cutout = solid(4, 4, [0, 0, 0, 0]);
        session.accept_cutout(cutout_ticket, cutout.clone()).unwrap();

        assert!(matches!(session.phase(), Phase::Edited { .. }));
        assert!(session.current().unwrap().same_as(&enhanced));
        assert!(session.processed().unwrap().same_as(&cutout));
        assert_eq!(session.toggle_compare(), Ok(true));
    }

    #[test]
    fn test_cutout_requested_after_edit_replaces_it() {
        let (mut session, _, _) = processed();
        let edit = session.issue(Slot::Working);
        session.accept_working(edit, solid(4, 4, [6, 6, 6, 255])).unwrap();

        let redo = session.issue(Slot::Cutout);
        let cutout = solid(4, 4, [1, 1, 1, 0]);
        session.accept_cutout(redo, cutout.clone()).unwrap();

        assert!(matches!(session.phase(), Phase::Processed { .. }));
        assert!(session.current().unwrap().same_as(&cutout));
    }
}
