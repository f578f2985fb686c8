//! Availability and capacity-allocation logic.
//!
//! Everything in this module is a pure function of the inputs: the schedule
//! policy, the day's bookings, the day's blocked intervals, and the requested
//! service. Handlers fetch rows, convert them with [`GroupedInterval`] /
//! [`Interval`], and call [`generate_slots`] (read-time, advisory) or
//! [`check_admission`] (write-time, authoritative, inside the same
//! transaction as the insert).

use std::collections::HashMap;

use crate::models::{BookingStatus, Service, ServiceCategory};

/// Minutes in a day; time-of-day values live in `[0, MINUTES_PER_DAY)`.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

// ── Time-of-day arithmetic ──

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid time {0:?}, expected HH:MM")]
pub struct InvalidTime(pub String);

/// Parse `"HH:MM"` into minutes since midnight.
///
/// Malformed input is rejected rather than defaulted: anything that is not
/// two colon-separated numeric components with hour < 24 and minute < 60
/// is an error.
pub fn parse_time(s: &str) -> Result<u32, InvalidTime> {
    let mut parts = s.splitn(3, ':');
    let (hour, minute) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), None) => (h, m),
        _ => return Err(InvalidTime(s.to_string())),
    };
    let hour: u32 = hour.parse().map_err(|_| InvalidTime(s.to_string()))?;
    let minute: u32 = minute.parse().map_err(|_| InvalidTime(s.to_string()))?;
    if hour >= 24 || minute >= 60 {
        return Err(InvalidTime(s.to_string()));
    }
    Ok(hour * 60 + minute)
}

/// Format minutes since midnight as `"HH:MM"`.
pub fn format_time(minute: u32) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

/// End of an appointment starting at `start` with the given duration.
/// Wraps past midnight, matching how end times are stored.
pub fn add_minutes(start: u32, duration: u32) -> u32 {
    (start + duration) % MINUTES_PER_DAY
}

// ── Intervals ──

/// Half-open minute interval `[start, end)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Half-open overlap test: an appointment ending at minute M does not
    /// conflict with one starting at M.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Whether `minute` lies inside `[start, end)`.
    pub fn contains(&self, minute: u32) -> bool {
        self.start <= minute && minute < self.end
    }
}

/// An occupied interval together with the capacity group it counts against.
/// Built from a booking row joined with its service.
#[derive(Debug, Clone, Copy)]
pub struct GroupedInterval {
    pub interval: Interval,
    pub group: CapacityGroup,
}

// ── Capacity groups ──

/// The pool within which simultaneous bookings compete for a shared ceiling.
/// Derived from (service name, category), never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapacityGroup {
    Hair,
    Hammam,
    Massage,
    Nails,
    Lashes,
    Facial,
}

impl CapacityGroup {
    /// Every service belongs to exactly one group. `HAMMAM_MASSAGE` splits on
    /// the service name ("massage" anywhere in it means the massage rooms);
    /// all other categories map to themselves.
    pub fn resolve(service_name: &str, category: ServiceCategory) -> Self {
        match category {
            ServiceCategory::HammamMassage => {
                if service_name.to_lowercase().contains("massage") {
                    CapacityGroup::Massage
                } else {
                    CapacityGroup::Hammam
                }
            }
            ServiceCategory::Hair => CapacityGroup::Hair,
            ServiceCategory::Nails => CapacityGroup::Nails,
            ServiceCategory::Lashes => CapacityGroup::Lashes,
            ServiceCategory::Facial => CapacityGroup::Facial,
        }
    }
}

// ── Schedule policy ──

/// Opening-hours grid and per-group capacity ceilings.
///
/// Injected into the generator and admission check rather than compiled in,
/// so deployments can tune it and tests can shrink it.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// First bookable minute of the day.
    pub open_minute: u32,
    /// Grid stops before this minute (exclusive).
    pub close_minute: u32,
    /// Grid step; also the tick width used for blocked-interval checks.
    pub step_minutes: u32,
    /// Ceiling per group; groups absent from the table default to 1.
    pub capacities: HashMap<CapacityGroup, u32>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            open_minute: 10 * 60,
            close_minute: 19 * 60,
            step_minutes: 30,
            capacities: HashMap::from([
                (CapacityGroup::Hair, 3),
                (CapacityGroup::Nails, 3),
                (CapacityGroup::Hammam, 2),
                (CapacityGroup::Massage, 1),
            ]),
        }
    }
}

impl ScheduleConfig {
    pub fn capacity_of(&self, group: CapacityGroup) -> u32 {
        self.capacities.get(&group).copied().unwrap_or(1)
    }

    /// Chronological candidate start minutes.
    fn grid(&self) -> impl Iterator<Item = u32> + '_ {
        (self.open_minute..self.close_minute).step_by(self.step_minutes as usize)
    }
}

// ── Slot generation (read-time, advisory) ──

/// Compute the bookable `"HH:MM"` start times for `service` on one day.
///
/// `bookings` must already exclude cancelled rows (see
/// [`BookingStatus::consumes_capacity`]); `blocked` intervals remove
/// candidates for every service regardless of group. Output follows the grid
/// order, so it is chronological and free of duplicates. The result reflects
/// state at read time only — admission is re-validated at write time.
pub fn generate_slots(
    config: &ScheduleConfig,
    service: &Service,
    bookings: &[GroupedInterval],
    blocked: &[Interval],
) -> Vec<String> {
    let group = CapacityGroup::resolve(&service.name, service.category);
    let ceiling = config.capacity_of(group);
    let duration = service.duration_min as u32;

    config
        .grid()
        .filter(|&start| {
            let candidate = Interval::new(start, start + duration);
            !is_blocked(config, &candidate, blocked)
                && concurrent_in_group(group, &candidate, bookings) < ceiling
        })
        .map(format_time)
        .collect()
}

/// A candidate is blocked when any grid tick within it falls inside a
/// blocked interval.
fn is_blocked(config: &ScheduleConfig, candidate: &Interval, blocked: &[Interval]) -> bool {
    (candidate.start..candidate.end)
        .step_by(config.step_minutes as usize)
        .any(|tick| blocked.iter().any(|b| b.contains(tick)))
}

/// Number of occupied intervals in `group` overlapping `candidate`.
fn concurrent_in_group(
    group: CapacityGroup,
    candidate: &Interval,
    bookings: &[GroupedInterval],
) -> u32 {
    bookings
        .iter()
        .filter(|b| b.group == group && b.interval.overlaps(candidate))
        .count() as u32
}

// ── Admission check (write-time, authoritative) ──

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AdmissionDenied {
    #[error("selected time falls within a blocked period")]
    Blocked,
    #[error("selected time is no longer available")]
    CapacitySaturated,
}

/// Re-validate one requested start time against the current day state.
///
/// The caller fetches `bookings` and `blocked` inside the same transaction
/// as the eventual insert; running this check outside that scope reopens the
/// read-then-write race it exists to prevent.
pub fn check_admission(
    config: &ScheduleConfig,
    service: &Service,
    start_minute: u32,
    bookings: &[GroupedInterval],
    blocked: &[Interval],
) -> Result<(), AdmissionDenied> {
    let requested = Interval::new(
        start_minute,
        start_minute + service.duration_min as u32,
    );

    if blocked.iter().any(|b| b.overlaps(&requested)) {
        return Err(AdmissionDenied::Blocked);
    }

    let group = CapacityGroup::resolve(&service.name, service.category);
    if concurrent_in_group(group, &requested, bookings) >= config.capacity_of(group) {
        return Err(AdmissionDenied::CapacitySaturated);
    }

    Ok(())
}

/// Convert booking rows (already joined with their service) into grouped
/// intervals, skipping statuses that do not consume capacity.
pub fn occupied_intervals(
    rows: &[(String, String, String, ServiceCategory, BookingStatus)],
) -> Result<Vec<GroupedInterval>, InvalidTime> {
    let mut out = Vec::with_capacity(rows.len());
    for (start, end, service_name, category, status) in rows {
        if !status.consumes_capacity() {
            continue;
        }
        out.push(GroupedInterval {
            interval: Interval::new(parse_time(start)?, parse_time(end)?),
            group: CapacityGroup::resolve(service_name, *category),
        });
    }
    Ok(out)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str, category: ServiceCategory, duration_min: i64) -> Service {
        Service {
            id: 1,
            name: name.to_string(),
            description: String::new(),
            category,
            duration_min,
            price: 100,
            is_active: true,
        }
    }

    fn massage_60() -> Service {
        service(
            "Massage - Relaxing Anti-stress 60 min",
            ServiceCategory::HammamMassage,
            60,
        )
    }

    fn booked(start: &str, end: &str, group: CapacityGroup) -> GroupedInterval {
        GroupedInterval {
            interval: Interval::new(parse_time(start).unwrap(), parse_time(end).unwrap()),
            group,
        }
    }

    fn blocked(start: &str, end: &str) -> Interval {
        Interval::new(parse_time(start).unwrap(), parse_time(end).unwrap())
    }

    // ── parse_time / format_time / add_minutes ──

    #[test]
    fn test_parse_time_valid() {
        assert_eq!(parse_time("00:00"), Ok(0));
        assert_eq!(parse_time("10:30"), Ok(630));
        assert_eq!(parse_time("23:59"), Ok(1439));
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        assert!(parse_time("garbage").is_err());
        assert!(parse_time("").is_err());
        assert!(parse_time("10").is_err());
        assert!(parse_time("10:30:00").is_err());
        assert!(parse_time("aa:bb").is_err());
    }

    #[test]
    fn test_parse_time_rejects_out_of_range() {
        assert!(parse_time("24:00").is_err());
        assert!(parse_time("10:60").is_err());
    }

    #[test]
    fn test_format_time_roundtrip() {
        assert_eq!(format_time(630), "10:30");
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(parse_time("18:45").unwrap()), "18:45");
    }

    #[test]
    fn test_add_minutes_basic() {
        assert_eq!(add_minutes(600, 90), 690);
    }

    #[test]
    fn test_add_minutes_wraps_past_midnight() {
        assert_eq!(add_minutes(parse_time("23:30").unwrap(), 60), 30);
    }

    // ── overlap ──

    #[test]
    fn test_overlap_symmetric() {
        let a = Interval::new(600, 660);
        let b = Interval::new(630, 690);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn test_touching_endpoints_do_not_overlap() {
        // [10:00,10:30) vs [10:30,11:00)
        let a = Interval::new(600, 630);
        let b = Interval::new(630, 660);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn test_containment_overlaps() {
        let outer = Interval::new(600, 720);
        let inner = Interval::new(630, 660);
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    // ── capacity groups ──

    #[test]
    fn test_hammam_massage_splits_on_name() {
        assert_eq!(
            CapacityGroup::resolve("Massage - Hot Stone", ServiceCategory::HammamMassage),
            CapacityGroup::Massage
        );
        assert_eq!(
            CapacityGroup::resolve(
                "Hammam - Royal Hammam 90 min",
                ServiceCategory::HammamMassage
            ),
            CapacityGroup::Hammam
        );
    }

    #[test]
    fn test_massage_match_is_case_insensitive() {
        assert_eq!(
            CapacityGroup::resolve("MASSAGE 4 hands", ServiceCategory::HammamMassage),
            CapacityGroup::Massage
        );
    }

    #[test]
    fn test_other_categories_map_to_themselves() {
        assert_eq!(
            CapacityGroup::resolve("Nails - Manicure", ServiceCategory::Nails),
            CapacityGroup::Nails
        );
        assert_eq!(
            CapacityGroup::resolve("Hair - Haircut", ServiceCategory::Hair),
            CapacityGroup::Hair
        );
    }

    #[test]
    fn test_capacity_table() {
        let config = ScheduleConfig::default();
        assert_eq!(config.capacity_of(CapacityGroup::Hair), 3);
        assert_eq!(config.capacity_of(CapacityGroup::Nails), 3);
        assert_eq!(config.capacity_of(CapacityGroup::Hammam), 2);
        assert_eq!(config.capacity_of(CapacityGroup::Massage), 1);
        // Groups without an explicit entry fall back to 1
        assert_eq!(config.capacity_of(CapacityGroup::Lashes), 1);
        assert_eq!(config.capacity_of(CapacityGroup::Facial), 1);
    }

    // ── generate_slots ──

    #[test]
    fn test_empty_day_yields_full_grid() {
        let config = ScheduleConfig::default();
        let slots = generate_slots(&config, &massage_60(), &[], &[]);
        // 10:00 through 18:30, every 30 minutes
        assert_eq!(slots.len(), 18);
        assert_eq!(slots.first().unwrap(), "10:00");
        assert_eq!(slots.last().unwrap(), "18:30");
    }

    #[test]
    fn test_empty_day_full_grid_regardless_of_duration() {
        let config = ScheduleConfig::default();
        let long = service("Hair - Botox Straightening", ServiceCategory::Hair, 180);
        assert_eq!(generate_slots(&config, &long, &[], &[]).len(), 18);
    }

    #[test]
    fn test_grid_is_chronological_and_unique() {
        let config = ScheduleConfig::default();
        let slots = generate_slots(&config, &massage_60(), &[], &[]);
        let mut sorted = slots.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(slots, sorted);
    }

    #[test]
    fn test_generation_is_idempotent() {
        let config = ScheduleConfig::default();
        let bookings = [booked("11:00", "12:00", CapacityGroup::Massage)];
        let blocked = [blocked("14:00", "15:00")];
        let first = generate_slots(&config, &massage_60(), &bookings, &blocked);
        let second = generate_slots(&config, &massage_60(), &bookings, &blocked);
        assert_eq!(first, second);
    }

    #[test]
    fn test_massage_ceiling_one_excludes_overlapping_starts() {
        // One existing MASSAGE booking [11:00,12:00), ceiling 1: a 60-minute
        // massage can no longer start at 11:00 or 11:30, but 10:00 (ends at
        // the boundary) and 12:00 (starts at the boundary) remain bookable.
        let config = ScheduleConfig::default();
        let bookings = [booked("11:00", "12:00", CapacityGroup::Massage)];
        let slots = generate_slots(&config, &massage_60(), &bookings, &[]);
        assert!(!slots.contains(&"11:00".to_string()));
        assert!(!slots.contains(&"11:30".to_string()));
        assert!(slots.contains(&"10:00".to_string()));
        assert!(slots.contains(&"12:00".to_string()));
        // 10:30 would end at 11:30, overlapping the existing booking
        assert!(!slots.contains(&"10:30".to_string()));
    }

    #[test]
    fn test_other_group_does_not_consume_massage_capacity() {
        let config = ScheduleConfig::default();
        let bookings = [booked("11:00", "12:00", CapacityGroup::Hair)];
        let slots = generate_slots(&config, &massage_60(), &bookings, &[]);
        assert!(slots.contains(&"11:00".to_string()));
    }

    #[test]
    fn test_blocked_interval_removes_slot_for_any_service() {
        let config = ScheduleConfig::default();
        let blocked = [blocked("14:00", "15:00")];
        for svc in [
            service("Nails - Normal Polish", ServiceCategory::Nails, 30),
            service("Hair - Haircut", ServiceCategory::Hair, 30),
            service("Lashes - Refill", ServiceCategory::Lashes, 30),
        ] {
            let slots = generate_slots(&config, &svc, &[], &blocked);
            assert!(!slots.contains(&"14:00".to_string()), "{}", svc.name);
            assert!(!slots.contains(&"14:30".to_string()), "{}", svc.name);
            assert!(slots.contains(&"15:00".to_string()), "{}", svc.name);
        }
    }

    #[test]
    fn test_blocked_tick_inside_long_candidate() {
        // 90-minute service starting 13:30 spans ticks 13:30/14:00/14:30;
        // blocking [14:00,14:30) kills it even though the start is free.
        let config = ScheduleConfig::default();
        let svc = service("Hammam - Royal Hammam 90 min", ServiceCategory::HammamMassage, 90);
        let slots = generate_slots(&config, &svc, &[], &[blocked("14:00", "14:30")]);
        assert!(!slots.contains(&"13:30".to_string()));
        assert!(!slots.contains(&"14:00".to_string()));
        assert!(slots.contains(&"14:30".to_string()));
    }

    #[test]
    fn test_hair_ceiling_three_allows_third_overlap() {
        let config = ScheduleConfig::default();
        let bookings = [
            booked("10:00", "10:45", CapacityGroup::Hair),
            booked("10:15", "11:00", CapacityGroup::Hair),
        ];
        let svc = service("Hair - Haircut", ServiceCategory::Hair, 45);
        // Two overlapping HAIR bookings, ceiling 3: 10:30 still offered.
        let slots = generate_slots(&config, &svc, &bookings, &[]);
        assert!(slots.contains(&"10:30".to_string()));
    }

    // ── check_admission ──

    #[test]
    fn test_admission_rejects_at_ceiling() {
        let config = ScheduleConfig::default();
        let svc = service("Hair - Haircut", ServiceCategory::Hair, 45);
        let two = [
            booked("10:00", "10:45", CapacityGroup::Hair),
            booked("10:15", "11:00", CapacityGroup::Hair),
        ];
        // count=2 < 3: admitted
        assert_eq!(check_admission(&config, &svc, 630, &two, &[]), Ok(()));

        // A third overlapping booking lands; count=3 >= 3: rejected
        let three = [
            booked("10:00", "10:45", CapacityGroup::Hair),
            booked("10:15", "11:00", CapacityGroup::Hair),
            booked("10:30", "11:15", CapacityGroup::Hair),
        ];
        assert_eq!(
            check_admission(&config, &svc, 630, &three, &[]),
            Err(AdmissionDenied::CapacitySaturated)
        );
    }

    #[test]
    fn test_admission_rejects_blocked() {
        let config = ScheduleConfig::default();
        assert_eq!(
            check_admission(
                &config,
                &massage_60(),
                parse_time("14:30").unwrap(),
                &[],
                &[blocked("14:00", "15:00")],
            ),
            Err(AdmissionDenied::Blocked)
        );
    }

    #[test]
    fn test_admission_boundary_start_is_allowed() {
        // Booking ends exactly when the blocked interval starts
        let config = ScheduleConfig::default();
        assert_eq!(
            check_admission(
                &config,
                &massage_60(),
                parse_time("13:00").unwrap(),
                &[],
                &[blocked("14:00", "15:00")],
            ),
            Ok(())
        );
    }

    #[test]
    fn test_admission_massage_ceiling_one() {
        let config = ScheduleConfig::default();
        let existing = [booked("11:00", "12:00", CapacityGroup::Massage)];
        assert_eq!(
            check_admission(
                &config,
                &massage_60(),
                parse_time("11:30").unwrap(),
                &existing,
                &[],
            ),
            Err(AdmissionDenied::CapacitySaturated)
        );
        assert_eq!(
            check_admission(
                &config,
                &massage_60(),
                parse_time("12:00").unwrap(),
                &existing,
                &[],
            ),
            Ok(())
        );
    }

    // ── status policy ──

    #[test]
    fn test_only_cancelled_releases_capacity() {
        assert!(BookingStatus::Pending.consumes_capacity());
        assert!(BookingStatus::Confirmed.consumes_capacity());
        assert!(!BookingStatus::Cancelled.consumes_capacity());
        // Deliberate policy: completed appointments stay on the books and
        // keep consuming capacity for their historical interval.
        assert!(BookingStatus::Completed.consumes_capacity());
    }

    #[test]
    fn test_occupied_intervals_skips_cancelled() {
        let rows = vec![
            (
                "11:00".to_string(),
                "12:00".to_string(),
                "Massage - Hot Stone".to_string(),
                ServiceCategory::HammamMassage,
                BookingStatus::Cancelled,
            ),
            (
                "13:00".to_string(),
                "14:00".to_string(),
                "Nails - Manicure".to_string(),
                ServiceCategory::Nails,
                BookingStatus::Confirmed,
            ),
        ];
        let occupied = occupied_intervals(&rows).unwrap();
        assert_eq!(occupied.len(), 1);
        assert_eq!(occupied[0].group, CapacityGroup::Nails);
    }

    #[test]
    fn test_occupied_intervals_rejects_malformed_row() {
        let rows = vec![(
            "nonsense".to_string(),
            "12:00".to_string(),
            "Massage".to_string(),
            ServiceCategory::HammamMassage,
            BookingStatus::Pending,
        )];
        assert!(occupied_intervals(&rows).is_err());
    }
}
