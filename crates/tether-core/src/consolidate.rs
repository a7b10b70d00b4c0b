//! Consolidation Builder — the read model returned for a resolved identity.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
  contact::{Contact, ContactId, LinkPrecedence},
  resolver,
  store::ContactTx,
};

/// Every contact point known for one identity.
///
/// `emails` and `phone_numbers` are deduplicated. The primary's own values
/// come first, the rest follow in store (id) order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedContact {
  pub primary_contact_id:    ContactId,
  pub emails:                Vec<String>,
  pub phone_numbers:         Vec<String>,
  pub secondary_contact_ids: Vec<ContactId>,
}

impl ConsolidatedContact {
  /// Assemble the view from the members of the cluster rooted at
  /// `primary_id`.
  pub fn from_members(primary_id: ContactId, members: &[Contact]) -> Self {
    let ordered = members
      .iter()
      .filter(|c| c.id == primary_id)
      .chain(members.iter().filter(|c| c.id != primary_id));

    let mut emails = Distinct::default();
    let mut phone_numbers = Distinct::default();
    let mut secondary_contact_ids = Vec::new();

    for contact in ordered {
      if let Some(email) = &contact.email {
        emails.push(email);
      }
      if let Some(phone) = &contact.phone_number {
        phone_numbers.push(phone);
      }
      if contact.link_precedence == LinkPrecedence::Secondary {
        secondary_contact_ids.push(contact.id);
      }
    }

    Self {
      primary_contact_id: primary_id,
      emails: emails.into_vec(),
      phone_numbers: phone_numbers.into_vec(),
      secondary_contact_ids,
    }
  }
}

/// Insertion-ordered set of strings.
#[derive(Default)]
struct Distinct<'a> {
  seen:  HashSet<&'a str>,
  items: Vec<String>,
}

impl<'a> Distinct<'a> {
  fn push(&mut self, value: &'a str) {
    if self.seen.insert(value) {
      self.items.push(value.to_owned());
    }
  }

  fn into_vec(self) -> Vec<String> { self.items }
}

// ─── Builders over a transaction ─────────────────────────────────────────────

/// Build the consolidated view for the cluster whose primary is `primary_id`.
pub fn build<T: ContactTx>(
  tx: &mut T,
  primary_id: ContactId,
) -> Result<ConsolidatedContact, T::Error> {
  let members = tx.cluster(primary_id)?;
  Ok(ConsolidatedContact::from_members(primary_id, &members))
}

/// Build the consolidated view for the cluster containing `id`, which may be
/// any member. Returns `None` if `id` does not exist.
pub fn view_of<T: ContactTx>(
  tx: &mut T,
  id: ContactId,
) -> Result<Option<ConsolidatedContact>, T::Error> {
  let Some(contact) = tx.get(id)? else {
    return Ok(None);
  };
  let primary = resolver::find_primary(tx, &contact)?;
  build(tx, primary.id).map(Some)
}
