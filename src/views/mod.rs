//! DOM-free view-models of the exercise pages.
//!
//! Each view owns its form inputs and the state of its selectors. Lookups go through
//! [`Selector`], which moves through `Idle -> Loading -> Loaded | Failed` and discards any
//! response that was superseded by a newer request or a clear.

pub mod dicomweb;
pub mod fhir;
pub mod hl7;
pub mod temperature;
pub mod viewport;

use crate::api::ClientError;
use thiserror::Error;

/// What the user is told when an action cannot be carried out.
#[derive(Debug, Error)]
pub enum ActionError {
	/// Rejected by client-side validation; nothing was sent.
	#[error("{0}")]
	Invalid(&'static str),
	/// The backend rejected the request or could not be reached.
	#[error("{alert}")]
	Failed {
		alert: String,
		#[source]
		source: ClientError,
	},
}

impl ActionError {
	/// Adapter for `map_err` that attaches the alert shown for a failed request.
	pub fn failed(alert: impl Into<String>) -> impl FnOnce(ClientError) -> Self {
		let alert = alert.into();
		move |source| Self::Failed { alert, source }
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
	Idle,
	Loading,
	Loaded(T),
	Failed(String),
}

impl<T> Default for LoadState<T> {
	fn default() -> Self {
		Self::Idle
	}
}

/// Identifies one request issued for a selector.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Ticket(u64);

/// Hands out tickets; only the most recent one is current.
///
/// The async view methods hold `&mut self` across their request, so within one of them a
/// ticket is always current when its response arrives. Tickets only go stale for callers
/// that keep `begin` and `complete` (or `Viewport::begin` and `Viewport::show`) apart, such
/// as an event loop that starts a new lookup before the previous one has resolved.
#[derive(Debug, Default)]
pub struct RequestGate {
	generation: u64,
}

impl RequestGate {
	pub fn issue(&mut self) -> Ticket {
		self.generation += 1;
		Ticket(self.generation)
	}

	/// Makes every outstanding ticket stale.
	pub fn invalidate(&mut self) {
		self.generation += 1;
	}

	pub const fn is_current(&self, ticket: Ticket) -> bool {
		ticket.0 == self.generation
	}
}

/// A select control fed by a backend lookup.
#[derive(Debug)]
pub struct Selector<T> {
	state: LoadState<Vec<T>>,
	selected: Option<usize>,
	gate: RequestGate,
}

impl<T> Default for Selector<T> {
	fn default() -> Self {
		Self {
			state: LoadState::Idle,
			selected: None,
			gate: RequestGate::default(),
		}
	}
}

impl<T> Selector<T> {
	pub const fn state(&self) -> &LoadState<Vec<T>> {
		&self.state
	}

	pub fn options(&self) -> &[T] {
		match &self.state {
			LoadState::Loaded(options) => options,
			_ => &[],
		}
	}

	pub fn selected(&self) -> Option<&T> {
		self.selected.and_then(|index| self.options().get(index))
	}

	pub const fn selected_index(&self) -> Option<usize> {
		self.selected
	}

	/// Empties the selector and drops any request in flight.
	pub fn clear(&mut self) {
		self.state = LoadState::Idle;
		self.selected = None;
		self.gate.invalidate();
	}

	/// Empties the selector and issues the ticket of a new lookup.
	pub fn begin(&mut self) -> Ticket {
		self.state = LoadState::Loading;
		self.selected = None;
		self.gate.issue()
	}

	/// Stores the outcome of the lookup identified by `ticket` and selects the first option.
	/// Returns `false`, leaving the selector untouched, when a newer lookup has started since.
	pub fn complete<E: ToString>(&mut self, ticket: Ticket, outcome: Result<Vec<T>, E>) -> bool {
		if !self.gate.is_current(ticket) {
			return false;
		}
		match outcome {
			Ok(options) => {
				self.selected = if options.is_empty() { None } else { Some(0) };
				self.state = LoadState::Loaded(options);
			}
			Err(err) => {
				self.selected = None;
				self.state = LoadState::Failed(err.to_string());
			}
		}
		true
	}

	/// Returns `false` if `index` is out of range; the selection is unchanged then.
	pub fn select(&mut self, index: usize) -> bool {
		if index < self.options().len() {
			self.selected = Some(index);
			true
		} else {
			false
		}
	}

	/// Selects the first option matching `predicate`.
	pub fn select_where(&mut self, predicate: impl Fn(&T) -> bool) -> bool {
		match self.options().iter().position(predicate) {
			Some(index) => self.select(index),
			None => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn stale_response_is_discarded() {
		let mut selector = Selector::<&str>::default();

		let first = selector.begin();
		let second = selector.begin();

		assert!(selector.complete::<String>(second, Ok(vec!["new"])));
		assert!(!selector.complete::<String>(first, Ok(vec!["old"])));
		assert_eq!(selector.options(), &["new"]);
		assert_eq!(selector.selected(), Some(&"new"));
	}

	#[test]
	fn clear_drops_request_in_flight() {
		let mut selector = Selector::<u8>::default();
		let ticket = selector.begin();
		assert_eq!(selector.state(), &LoadState::Loading);

		selector.clear();
		assert!(!selector.complete::<String>(ticket, Ok(vec![1])));
		assert_eq!(selector.state(), &LoadState::Idle);
		assert_eq!(selector.selected(), None);
	}

	#[test]
	fn failure_leaves_selector_empty() {
		let mut selector = Selector::<u8>::default();
		let ticket = selector.begin();
		assert!(selector.complete(ticket, Err("connection refused")));

		assert!(selector.options().is_empty());
		assert_eq!(selector.selected(), None);
		assert_eq!(
			selector.state(),
			&LoadState::Failed(String::from("connection refused"))
		);
	}

	#[test]
	fn select_stays_in_range() {
		let mut selector = Selector::default();
		let ticket = selector.begin();
		selector.complete::<String>(ticket, Ok(vec![10, 20, 30]));

		assert!(selector.select(2));
		assert_eq!(selector.selected(), Some(&30));
		assert!(!selector.select(3));
		assert_eq!(selector.selected_index(), Some(2));
		assert!(selector.select_where(|value| *value == 20));
		assert_eq!(selector.selected(), Some(&20));
		assert!(!selector.select_where(|value| *value == 99));
	}
}
