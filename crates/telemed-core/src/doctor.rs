//! Doctor entities.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::slot::AppointmentSlotCollection;

/// A professional offering telemedicine appointments.
///
/// Identity is the upstream id: two doctors with the same id compare equal
/// regardless of the rest of their data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    /// Upstream-assigned identifier.
    pub id: String,
    /// Full name.
    pub name: String,
    /// Registration number at the medical council (e.g. CRM).
    pub council_number: String,
    /// Photo URL or reference.
    pub photo: Option<String>,
    /// Available slots, when fetched together with the doctor.
    pub slots: Option<AppointmentSlotCollection>,
}

impl Doctor {
    /// Creates a doctor without photo or slots.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        council_number: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            council_number: council_number.into(),
            photo: None,
            slots: None,
        }
    }

    /// Builder method to set the photo.
    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = Some(photo.into());
        self
    }

    /// Returns a new doctor carrying `slots`; `self` is left untouched.
    pub fn with_slots(&self, slots: AppointmentSlotCollection) -> Self {
        Self {
            slots: Some(slots),
            ..self.clone()
        }
    }

    /// Returns the attached slots, or an empty collection.
    pub fn slots(&self) -> AppointmentSlotCollection {
        self.slots.clone().unwrap_or_default()
    }
}

impl PartialEq for Doctor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Doctor {}

impl Hash for Doctor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// An ordered list of doctors.
///
/// Iteration follows insertion order; equality does not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoctorCollection {
    doctors: Vec<Doctor>,
}

impl DoctorCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a doctor.
    pub fn add(&mut self, doctor: Doctor) {
        self.doctors.push(doctor);
    }

    /// Returns the number of doctors.
    pub fn len(&self) -> usize {
        self.doctors.len()
    }

    /// Returns true if the collection has no doctors.
    pub fn is_empty(&self) -> bool {
        self.doctors.is_empty()
    }

    /// Returns the doctor at `index`.
    pub fn get(&self, index: usize) -> Option<&Doctor> {
        self.doctors.get(index)
    }

    /// Returns the first doctor.
    pub fn first(&self) -> Option<&Doctor> {
        self.doctors.first()
    }

    /// Finds a doctor by id.
    pub fn find(&self, id: &str) -> Option<&Doctor> {
        self.doctors.iter().find(|doctor| doctor.id == id)
    }

    /// Returns the position of the doctor with `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.doctors.iter().position(|doctor| doctor.id == id)
    }

    /// Replaces the doctor at `index`, returning the previous one.
    pub fn replace(&mut self, index: usize, doctor: Doctor) -> Option<Doctor> {
        self.doctors
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, doctor))
    }

    /// Iterates the doctors in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Doctor> {
        self.doctors.iter()
    }

    /// Returns a new collection with the doctors matching `predicate`.
    pub fn filter<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&Doctor) -> bool,
    {
        self.doctors
            .iter()
            .filter(|doctor| predicate(doctor))
            .cloned()
            .collect()
    }
}

impl PartialEq for DoctorCollection {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|d| other.find(&d.id).is_some())
    }
}

impl Eq for DoctorCollection {}

impl FromIterator<Doctor> for DoctorCollection {
    fn from_iter<I: IntoIterator<Item = Doctor>>(iter: I) -> Self {
        Self {
            doctors: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for DoctorCollection {
    type Item = Doctor;
    type IntoIter = std::vec::IntoIter<Doctor>;

    fn into_iter(self) -> Self::IntoIter {
        self.doctors.into_iter()
    }
}

impl<'a> IntoIterator for &'a DoctorCollection {
    type Item = &'a Doctor;
    type IntoIter = std::slice::Iter<'a, Doctor>;

    fn into_iter(self) -> Self::IntoIter {
        self.doctors.iter()
    }
}
