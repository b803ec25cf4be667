//! Column layout for a single sorted roster.
//!
//! The client renders the roster as one list sorted by name and flows it
//! into fixed columns top-to-bottom, left-to-right. There is no column API,
//! so columns are faked by reserving a contiguous range of slots per column
//! and choosing sort keys that land each synthetic row in its range:
//!
//! ```text
//!  slot   0 ..  19        20 .. 21   22 .. 22+P   ..  39         40 .. 59
//!        ┌──────────────┬──────────┬─────────────┬───────────┬──────────────┐
//!  key   │ !00 .. !19   │ !20 !21  │ real names  │ ~2x .. ~39│ ~40 .. ~59   │
//!        │ left lines + │ center   │ (A-Z, not   │ center    │ right lines +│
//!        │ left padding │ title    │  ours)      │ padding   │ right padding│
//!        └──────────────┴──────────┴─────────────┴───────────┴──────────────┘
//!                         └──────────── center column ───────┘
//! ```
//!
//! `!` sorts below every participant name and `~` above, so real
//! participants always fall between the center title and the center
//! padding. The client displays every participant, so padding shrinks by
//! the full participant count, which keeps every column boundary fixed as
//! long as the participants fit in the room the title leaves. In two-column
//! mode the left column hosts the participants the same way.
//!
//! The engine is pure: it reads the viewer context and the config snapshot
//! and produces rows. It never touches per-viewer state.

use std::ops::Range;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::{EntriesConfig, LayoutMode, RosterConfig};
use crate::entry::PresenceEntry;
use crate::identity::{counter_identity, slot_identity};
use crate::markup::{MarkupRenderer, StyledLabel, TagMarkup};
use crate::placeholder::{fill_count, BuiltinSubstitutor, Substitutor};
use crate::viewer::ViewerContext;

/// Which side of the real participant names a key sorts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixClass {
    Before,
    After,
}

impl PrefixClass {
    fn char(self, config: &EntriesConfig) -> char {
        match self {
            PrefixClass::Before => config.before_prefix,
            PrefixClass::After => config.after_prefix,
        }
    }
}

/// A reserved, contiguous range of slots holding one logical column.
#[derive(Debug, Clone)]
pub struct LayoutRegion<'a> {
    pub name: &'static str,
    pub lines: &'a [String],
    /// First global slot of the region.
    pub start: usize,
    /// Slots reserved, whatever the number of lines.
    pub slots: usize,
    pub prefix: PrefixClass,
    /// Pad to the full budget. Only single-list mode leaves this off.
    pub padded: bool,
    /// Real participants are displayed inside this region, after its lines.
    pub hosts_participants: bool,
}

impl LayoutRegion<'_> {
    pub fn end(&self) -> usize {
        self.start + self.slots
    }
}

/// What a placed row is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Line,
    Padding,
    Counter,
}

/// A row together with its position in the layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedEntry {
    pub region: &'static str,
    pub slot: usize,
    pub kind: EntryKind,
    pub entry: PresenceEntry,
}

/// Slots a region ended up reserving in one computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSpan {
    pub name: &'static str,
    /// Every slot the region owns.
    pub slots: Range<usize>,
    /// Slots the client fills with real participants (empty for most regions).
    pub participants: Range<usize>,
    /// Slot of the overflow counter, if one was placed.
    pub counter: Option<usize>,
}

/// Full result of one layout computation.
#[derive(Debug, Clone, Default)]
pub struct LayoutPlan {
    pub entries: Vec<PlacedEntry>,
    pub spans: Vec<RegionSpan>,
}

impl LayoutPlan {
    pub fn into_entries(self) -> Vec<PresenceEntry> {
        self.entries.into_iter().map(|p| p.entry).collect()
    }

    pub fn span(&self, name: &str) -> Option<&RegionSpan> {
        self.spans.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Turns a roster configuration into the ordered rows for one viewer.
pub struct LayoutEngine {
    markup: Arc<dyn MarkupRenderer>,
    substitutor: Arc<dyn Substitutor>,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(Arc::new(TagMarkup::new()), Arc::new(BuiltinSubstitutor::new()))
    }
}

impl LayoutEngine {
    pub fn new(markup: Arc<dyn MarkupRenderer>, substitutor: Arc<dyn Substitutor>) -> Self {
        Self { markup, substitutor }
    }

    /// Region partition for a configuration.
    ///
    /// Depends only on the configuration, never on participant counts.
    pub fn regions<'a>(config: &'a EntriesConfig) -> Vec<LayoutRegion<'a>> {
        let budget = config.column_slots;
        let column = |name, lines: &'a [String], index: usize, prefix, hosts| LayoutRegion {
            name,
            lines,
            start: index * budget,
            slots: budget,
            prefix,
            padded: true,
            hosts_participants: hosts,
        };

        match config.layout {
            LayoutMode::Single => {
                vec![LayoutRegion {
                    name: "single",
                    lines: &config.lines,
                    start: 0,
                    slots: config.lines.len(),
                    prefix: PrefixClass::After,
                    padded: false,
                    hosts_participants: false,
                }]
            }
            LayoutMode::Columns => vec![
                column("left", &config.left_column, 0, PrefixClass::After, true),
                column("right", &config.right_column, 1, PrefixClass::After, false),
            ],
            LayoutMode::ThreeColumns => vec![
                column("left", &config.left_column, 0, PrefixClass::Before, false),
                column("center", &config.center_column, 1, PrefixClass::After, true),
                column("right", &config.right_column, 2, PrefixClass::After, false),
            ],
        }
    }

    /// Ordered rows for `viewer`.
    pub fn compute(&self, viewer: &ViewerContext, config: &RosterConfig) -> Vec<PresenceEntry> {
        self.plan(viewer, config).into_entries()
    }

    /// Ordered rows for `viewer`, with their slots and region spans.
    pub fn plan(&self, viewer: &ViewerContext, config: &RosterConfig) -> LayoutPlan {
        let entries = &config.entries;
        let regions = Self::regions(entries);
        let total_slots = regions.last().map_or(0, LayoutRegion::end);

        let mut builder = PlanBuilder {
            engine: self,
            viewer,
            config: entries,
            width: key_width(total_slots),
            plan: LayoutPlan::default(),
        };

        for region in &regions {
            builder.region(region);
        }

        log::trace!(
            "Layout for {}: {} rows over {} slots",
            viewer.session().name,
            builder.plan.len(),
            total_slots
        );
        builder.plan
    }

    /// Substitute and render one template; plain text if the markup is bad.
    fn label(&self, viewer: &ViewerContext, raw: &str, slot: usize) -> StyledLabel {
        let processed = self.substitutor.substitute(viewer, raw);
        match self.markup.render(&processed) {
            Ok(label) => label,
            Err(e) => {
                log::warn!("Failed to render roster line at slot {slot}: {e}; using plain text");
                StyledLabel::plain(processed)
            }
        }
    }
}

/// Digits needed so that lexicographic key order equals slot order.
fn key_width(total_slots: usize) -> usize {
    let highest = total_slots.saturating_sub(1);
    highest.to_string().len().max(2)
}

struct PlanBuilder<'e> {
    engine: &'e LayoutEngine,
    viewer: &'e ViewerContext,
    config: &'e EntriesConfig,
    width: usize,
    plan: LayoutPlan,
}

impl PlanBuilder<'_> {
    fn region(&mut self, region: &LayoutRegion<'_>) {
        let end = region.end();
        let line_prefix = if region.hosts_participants {
            PrefixClass::Before
        } else {
            region.prefix
        };

        // Single mode shows non-empty lines only; columns keep blank lines
        // as spacers.
        let lines: Vec<&String> = if region.padded {
            region.lines.iter().collect()
        } else {
            region.lines.iter().filter(|l| !l.trim().is_empty()).collect()
        };
        let line_count = lines.len().min(region.slots);
        if lines.len() > region.slots {
            log::warn!(
                "Region {} has {} lines for {} slots; dropping the rest",
                region.name,
                lines.len(),
                region.slots
            );
        }

        for (i, raw) in lines.iter().take(line_count).enumerate() {
            let slot = region.start + i;
            let label = self.engine.label(self.viewer, raw, slot);
            let identity = slot_identity(region.name, slot);
            self.push(region.name, slot, EntryKind::Line, line_prefix, identity, label);
        }

        let mut next = region.start + line_count;
        let mut participants = next..next;
        let mut counter = None;

        if region.hosts_participants {
            let (shown, counter_slot) = self.participant_block(next, end);
            participants = next..next + shown;
            next += shown;
            counter = counter_slot;
        }

        if region.padded {
            for slot in next..end {
                if Some(slot) == counter {
                    self.push_counter(region.name, slot);
                } else {
                    let identity = slot_identity(region.name, slot);
                    self.push(
                        region.name,
                        slot,
                        EntryKind::Padding,
                        region.prefix,
                        identity,
                        StyledLabel::empty(),
                    );
                }
            }
        }

        let slots = if region.padded {
            region.start..end
        } else {
            region.start..region.start + line_count
        };
        self.plan.spans.push(RegionSpan {
            name: region.name,
            slots,
            participants,
            counter,
        });
    }

    /// How many participants the client displays from `first_free`, and
    /// where the overflow counter goes.
    ///
    /// Every online participant is displayed, cap or not, so the block is
    /// `min(online, room)` wide. Past the cap, the counter takes the slot
    /// after one spacer row, at least `first_free + cap + 1`, clamped to the
    /// last slot of the region. With no slot left the counter is dropped.
    fn participant_block(&self, first_free: usize, end: usize) -> (usize, Option<usize>) {
        let room = end - first_free;
        let online = self.viewer.participants();
        let shown = online.min(room);
        let shown_end = first_free + shown;

        match self.config.max_center_players {
            Some(cap) if online > cap => {
                if shown_end >= end {
                    log::debug!("No slot left for the overflow counter: {online} participants, {room} slots");
                    return (shown, None);
                }
                let target = (first_free + cap + 1).max(shown_end + 1);
                let counter_slot = target.min(end - 1);
                if counter_slot != target {
                    log::debug!("Overflow counter clamped from slot {target} to {counter_slot}");
                }
                (shown, Some(counter_slot))
            }
            _ => (shown, None),
        }
    }

    fn push_counter(&mut self, region: &'static str, slot: usize) {
        let cap = self.config.max_center_players.unwrap_or(0);
        let hidden = self.viewer.participants().saturating_sub(cap);
        let template = fill_count(&self.config.counter_template, hidden);
        let label = self.engine.label(self.viewer, &template, slot);
        self.push(region, slot, EntryKind::Counter, PrefixClass::After, counter_identity(), label);
    }

    fn push(
        &mut self,
        region: &'static str,
        slot: usize,
        kind: EntryKind,
        prefix: PrefixClass,
        identity: Uuid,
        label: StyledLabel,
    ) {
        let sort_key = format!("{}{:0width$}", prefix.char(self.config), slot, width = self.width);
        match PresenceEntry::new(
            identity,
            sort_key,
            label,
            self.config.latency,
            self.config.status_icon,
        ) {
            Ok(entry) => self.plan.entries.push(PlacedEntry {
                region,
                slot,
                kind,
                entry,
            }),
            Err(e) => {
                log::warn!("Rejected roster row at slot {slot} in {region}: {e}");
            }
        }
    }
}
