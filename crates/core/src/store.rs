use crate::models::RetrievalHit;

/// Raw nearest-neighbour match as reported by a store. Any field but the id
/// may be missing when the record was written without it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreMatch {
    pub id: String,
    pub text: Option<String>,
    pub distance: Option<f32>,
    pub page: Option<u32>,
}

impl StoreMatch {
    pub fn into_hit(self) -> RetrievalHit {
        RetrievalHit {
            text: self.text.unwrap_or_default(),
            distance: self.distance.filter(|distance| distance.is_finite()),
            page: self.page.filter(|page| *page > 0),
        }
    }
}
