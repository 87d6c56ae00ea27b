/// Why a `load_older` call was refused without touching the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDenied {
    /// All history has been loaded; permanent for this session.
    Exhausted,
    /// A history request is already outstanding.
    InFlight,
}

/// Backward-pagination lane state: an explicit in-flight guard (overlapping
/// requests are refused at the engine boundary, not left to the caller's
/// UI) and the one-way exhaustion flag.
#[derive(Debug, Default)]
pub struct HistoryLane {
    in_flight: bool,
    exhausted: bool,
}

impl HistoryLane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Claim the lane for one request. `requested` keeps the caller's count
    /// semantics: positive for exactly that many older messages, negative
    /// for the whole remaining backlog, zero for the default page size.
    /// Returns the normalized count to send to the gateway.
    pub fn try_begin(&mut self, requested: i64, default_page: u32) -> Result<i64, HistoryDenied> {
        if self.exhausted {
            return Err(HistoryDenied::Exhausted);
        }
        if self.in_flight {
            return Err(HistoryDenied::InFlight);
        }
        self.in_flight = true;
        Ok(if requested == 0 {
            i64::from(default_page)
        } else {
            requested
        })
    }

    /// Release the lane after a failed request; it stays usable for a
    /// retry.
    pub fn abort(&mut self) {
        self.in_flight = false;
    }

    /// Release the lane after a successful batch and evaluate the
    /// termination rule. Returns true when history just became exhausted:
    /// the caller asked for the full backlog, the server returned nothing,
    /// or it returned fewer records than the finite count requested.
    pub fn finish(&mut self, requested: i64, received: usize) -> bool {
        self.in_flight = false;
        if requested < 0 || received == 0 || (received as i64) < requested {
            self.exhausted = true;
        }
        self.exhausted
    }
}
