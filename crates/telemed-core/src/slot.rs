//! Bookable appointment slots.

use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};

/// A bookable moment offered by a doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentSlot {
    /// Upstream slot identifier.
    pub id: String,
    /// When the appointment would take place.
    pub date: DateTime<FixedOffset>,
}

impl AppointmentSlot {
    /// Creates a new slot.
    pub fn new(id: impl Into<String>, date: DateTime<FixedOffset>) -> Self {
        Self {
            id: id.into(),
            date,
        }
    }

    /// Returns true unless the slot is strictly after `until`.
    pub fn is_on_or_before<Tz: TimeZone>(&self, until: &DateTime<Tz>) -> bool {
        self.date <= *until
    }
}

/// An ordered list of slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppointmentSlotCollection {
    slots: Vec<AppointmentSlot>,
}

impl AppointmentSlotCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a slot.
    pub fn add(&mut self, slot: AppointmentSlot) {
        self.slots.push(slot);
    }

    /// Returns the number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if there are no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the slot at `index`.
    pub fn get(&self, index: usize) -> Option<&AppointmentSlot> {
        self.slots.get(index)
    }

    /// Returns the first slot.
    pub fn first(&self) -> Option<&AppointmentSlot> {
        self.slots.first()
    }

    /// Finds a slot by id.
    pub fn find(&self, id: &str) -> Option<&AppointmentSlot> {
        self.slots.iter().find(|slot| slot.id == id)
    }

    /// Iterates the slots in order.
    pub fn iter(&self) -> std::slice::Iter<'_, AppointmentSlot> {
        self.slots.iter()
    }

    /// Returns a new collection with the slots matching `predicate`.
    pub fn filter<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&AppointmentSlot) -> bool,
    {
        self.slots
            .iter()
            .filter(|slot| predicate(slot))
            .cloned()
            .collect()
    }

    /// Returns a new collection without the slots strictly after `until`.
    pub fn until<Tz: TimeZone>(&self, until: &DateTime<Tz>) -> Self {
        self.filter(|slot| slot.is_on_or_before(until))
    }

    /// Returns a new collection with at most `limit` slots.
    pub fn truncated(&self, limit: usize) -> Self {
        self.slots.iter().take(limit).cloned().collect()
    }
}

impl FromIterator<AppointmentSlot> for AppointmentSlotCollection {
    fn from_iter<I: IntoIterator<Item = AppointmentSlot>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}

impl Extend<AppointmentSlot> for AppointmentSlotCollection {
    fn extend<I: IntoIterator<Item = AppointmentSlot>>(&mut self, iter: I) {
        self.slots.extend(iter);
    }
}

impl IntoIterator for AppointmentSlotCollection {
    type Item = AppointmentSlot;
    type IntoIter = std::vec::IntoIter<AppointmentSlot>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter()
    }
}

impl<'a> IntoIterator for &'a AppointmentSlotCollection {
    type Item = &'a AppointmentSlot;
    type IntoIter = std::slice::Iter<'a, AppointmentSlot>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::west_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2030, 1, 10, hour, 0, 0)
            .unwrap()
    }

    fn collection() -> AppointmentSlotCollection {
        (8..12)
            .map(|h| AppointmentSlot::new(format!("slot-{}", h), at(h)))
            .collect()
    }

    #[test]
    fn add_and_index() {
        let mut slots = AppointmentSlotCollection::new();
        assert!(slots.is_empty());
        slots.add(AppointmentSlot::new("a", at(9)));
        assert_eq!(slots.len(), 1);
        assert_eq!(slots.get(0).unwrap().id, "a");
        assert!(slots.get(1).is_none());
    }

    #[test]
    fn until_is_inclusive() {
        let slots = collection().until(&at(10));
        let ids: Vec<_> = slots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["slot-8", "slot-9", "slot-10"]);
    }

    #[test]
    fn until_compares_instants_across_offsets() {
        // 13:00 UTC is 10:00 at -03:00.
        let bound = chrono::Utc.with_ymd_and_hms(2030, 1, 10, 13, 0, 0).unwrap();
        assert_eq!(collection().until(&bound).len(), 3);
    }

    #[test]
    fn truncation() {
        assert_eq!(collection().truncated(2).len(), 2);
        assert_eq!(collection().truncated(10).len(), 4);
        assert!(collection().truncated(0).is_empty());
    }

    #[test]
    fn filter_and_find() {
        let odd = collection().filter(|s| s.id.ends_with('9') || s.id.ends_with("11"));
        assert_eq!(odd.len(), 2);
        assert!(odd.find("slot-9").is_some());
        assert!(odd.find("slot-8").is_none());
    }
}
