use crate::domain::coupon::Coupon;
use crate::domain::course::Course;
use crate::domain::ports::CouponStore;
use crate::error::{EngineError, Result};
use crate::infrastructure::in_memory::InMemoryCourseCatalog;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Courses and coupon definitions loaded from a JSON document:
///
/// ```json
/// { "courses": [ ... ], "coupons": [ ... ] }
/// ```
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub coupons: Vec<Coupon>,
}

impl CatalogFile {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let catalog: Self = serde_json::from_reader(source)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    fn validate(&self) -> Result<()> {
        let mut course_ids = HashSet::new();
        for course in &self.courses {
            if !course_ids.insert(course.id) {
                return Err(EngineError::BadRequest(format!(
                    "Duplicate course id {}",
                    course.id
                )));
            }
        }

        let mut codes = HashSet::new();
        for coupon in &self.coupons {
            coupon.validate()?;
            if !codes.insert(coupon.code.as_str()) {
                return Err(EngineError::BadRequest(format!(
                    "Duplicate coupon code {}",
                    coupon.code
                )));
            }
        }
        Ok(())
    }

    pub fn course_catalog(&self) -> InMemoryCourseCatalog {
        InMemoryCourseCatalog::with_courses(self.courses.iter().cloned())
    }

    /// Stores every coupon whose code is not known yet and returns how many were added.
    ///
    /// Existing coupons keep their usage counters across runs.
    pub async fn seed_coupons(&self, store: &dyn CouponStore) -> Result<usize> {
        let mut seeded = 0;
        for coupon in &self.coupons {
            if store.find_by_code(&coupon.code).await?.is_some() {
                tracing::debug!(code = %coupon.code, "Coupon already present, keeping stored state");
                continue;
            }
            store.store(coupon.clone()).await?;
            seeded += 1;
        }
        Ok(seeded)
    }
}
