//! Form merge engine.
//!
//! The draft form is the in-progress record during creation and editing.
//! Every field carries a provenance tag recording who wrote it last (initial
//! default, user keystroke, or extraction result) and when. Merge semantics
//! are last-writer-wins per field: a non-empty extraction value overwrites
//! unconditionally, an empty one leaves the field untouched.
//!
//! Known, accepted hazard: an extraction resolving after the user has
//! hand-corrected a field will silently clobber the edit. The provenance
//! tags keep that observable (and swappable for a last-user-wins policy
//! later) without changing the merge step.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::ExtractionUpdate;
use crate::models::{ImagePayload, ImageSet, ImageSlot, RmaRecord, RmaStatus};

/// Who wrote a field last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Writer {
    Default,
    User,
    Extraction,
}

/// A form field value tagged with write provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    value: String,
    written_by: Writer,
    written_at: DateTime<Utc>,
}

impl Field {
    fn seeded(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            written_by: Writer::Default,
            written_at: Utc::now(),
        }
    }

    fn write(&mut self, value: impl Into<String>, writer: Writer) {
        self.value = value.into();
        self.written_by = writer;
        self.written_at = Utc::now();
    }

    /// Extraction write: non-empty overwrites, empty is a no-op.
    fn merge_extraction(&mut self, value: &str) {
        if !value.is_empty() {
            self.write(value, Writer::Extraction);
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn written_by(&self) -> Writer {
        self.written_by
    }

    pub fn written_at(&self) -> DateTime<Utc> {
        self.written_at
    }
}

/// Addressable fields of the draft form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    CustomerCountry,
    Customer,
    Source,
    Size,
    Odf,
    Bom,
    Brand,
    ModelPn,
    DefectDescription,
    Ver,
    Wc,
    OcSerialNumber,
    Remark,
    Date,
}

impl FormField {
    pub const ALL: [FormField; 14] = [
        Self::CustomerCountry,
        Self::Customer,
        Self::Source,
        Self::Size,
        Self::Odf,
        Self::Bom,
        Self::Brand,
        Self::ModelPn,
        Self::DefectDescription,
        Self::Ver,
        Self::Wc,
        Self::OcSerialNumber,
        Self::Remark,
        Self::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerCountry => "customer_country",
            Self::Customer => "customer",
            Self::Source => "source",
            Self::Size => "size",
            Self::Odf => "odf",
            Self::Bom => "bom",
            Self::Brand => "brand",
            Self::ModelPn => "model_pn",
            Self::DefectDescription => "defect_description",
            Self::Ver => "ver",
            Self::Wc => "wc",
            Self::OcSerialNumber => "oc_serial_number",
            Self::Remark => "remark",
            Self::Date => "date",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "customer_country" | "country" => Some(Self::CustomerCountry),
            "customer" => Some(Self::Customer),
            "source" => Some(Self::Source),
            "size" => Some(Self::Size),
            "odf" => Some(Self::Odf),
            "bom" => Some(Self::Bom),
            "brand" => Some(Self::Brand),
            "model_pn" | "model" => Some(Self::ModelPn),
            "defect_description" | "defect" => Some(Self::DefectDescription),
            "ver" | "version" => Some(Self::Ver),
            "wc" => Some(Self::Wc),
            "oc_serial_number" | "serial" => Some(Self::OcSerialNumber),
            "remark" => Some(Self::Remark),
            "date" => Some(Self::Date),
            _ => None,
        }
    }
}

/// The in-progress editable record.
#[derive(Debug, Clone)]
pub struct DraftForm {
    customer_country: Field,
    customer: Field,
    source: Field,
    size: Field,
    odf: Field,
    bom: Field,
    brand: Field,
    model_pn: Field,
    defect_description: Field,
    ver: Field,
    wc: Field,
    oc_serial_number: Field,
    remark: Field,
    date: Field,
    images: ImageSet,
}

impl DraftForm {
    /// Fresh draft with the fixed customer defaults and today's date.
    pub fn new() -> Self {
        Self {
            customer_country: Field::seeded("ALGERIA"),
            customer: Field::seeded("Bomare Company"),
            source: Field::seeded(""),
            size: Field::seeded(""),
            odf: Field::seeded(""),
            bom: Field::seeded(""),
            brand: Field::seeded(""),
            model_pn: Field::seeded(""),
            defect_description: Field::seeded(""),
            ver: Field::seeded(""),
            wc: Field::seeded(""),
            oc_serial_number: Field::seeded(""),
            remark: Field::seeded(""),
            date: Field::seeded(Local::now().format("%Y-%m-%d").to_string()),
            images: ImageSet::default(),
        }
    }

    /// Draft seeded from an existing record for a review/edit session.
    pub fn from_record(record: &RmaRecord) -> Self {
        Self {
            customer_country: Field::seeded(&record.customer_country),
            customer: Field::seeded(&record.customer),
            source: Field::seeded(&record.source),
            size: Field::seeded(&record.size),
            odf: Field::seeded(&record.odf),
            bom: Field::seeded(&record.bom),
            brand: Field::seeded(&record.brand),
            model_pn: Field::seeded(&record.model_pn),
            defect_description: Field::seeded(&record.defect_description),
            ver: Field::seeded(&record.ver),
            wc: Field::seeded(&record.wc),
            oc_serial_number: Field::seeded(&record.oc_serial_number),
            remark: Field::seeded(&record.remark),
            date: Field::seeded(&record.date),
            images: record.images.clone(),
        }
    }

    fn field_mut(&mut self, field: FormField) -> &mut Field {
        match field {
            FormField::CustomerCountry => &mut self.customer_country,
            FormField::Customer => &mut self.customer,
            FormField::Source => &mut self.source,
            FormField::Size => &mut self.size,
            FormField::Odf => &mut self.odf,
            FormField::Bom => &mut self.bom,
            FormField::Brand => &mut self.brand,
            FormField::ModelPn => &mut self.model_pn,
            FormField::DefectDescription => &mut self.defect_description,
            FormField::Ver => &mut self.ver,
            FormField::Wc => &mut self.wc,
            FormField::OcSerialNumber => &mut self.oc_serial_number,
            FormField::Remark => &mut self.remark,
            FormField::Date => &mut self.date,
        }
    }

    pub fn field(&self, field: FormField) -> &Field {
        match field {
            FormField::CustomerCountry => &self.customer_country,
            FormField::Customer => &self.customer,
            FormField::Source => &self.source,
            FormField::Size => &self.size,
            FormField::Odf => &self.odf,
            FormField::Bom => &self.bom,
            FormField::Brand => &self.brand,
            FormField::ModelPn => &self.model_pn,
            FormField::DefectDescription => &self.defect_description,
            FormField::Ver => &self.ver,
            FormField::Wc => &self.wc,
            FormField::OcSerialNumber => &self.oc_serial_number,
            FormField::Remark => &self.remark,
            FormField::Date => &self.date,
        }
    }

    pub fn get(&self, field: FormField) -> &str {
        self.field(field).value()
    }

    /// Direct user keystroke: unconditional write tagged as User.
    pub fn set_user(&mut self, field: FormField, value: impl Into<String>) {
        self.field_mut(field).write(value, Writer::User);
    }

    pub fn images(&self) -> &ImageSet {
        &self.images
    }

    /// Store a captured payload, replacing any prior payload in the slot.
    pub fn attach_image(&mut self, slot: ImageSlot, payload: ImagePayload) {
        self.images.set(slot, payload);
    }

    pub fn clear_image(&mut self, slot: ImageSlot) {
        self.images.clear(slot);
    }

    /// Merge an extraction result into the draft.
    ///
    /// Each update writes only its own named fields, so overlapping in-flight
    /// extractions for different slots cannot cross-contaminate.
    pub fn apply(&mut self, update: ExtractionUpdate) {
        match update {
            ExtractionUpdate::DefectCategory(category) => {
                self.defect_description.merge_extraction(&category);
            }
            ExtractionUpdate::OcLabel(details) => {
                self.oc_serial_number
                    .merge_extraction(&details.oc_serial_number);
                self.wc.merge_extraction(&details.wc);
                self.model_pn.merge_extraction(&details.model_pn);
                self.ver.merge_extraction(&details.ver);
            }
            ExtractionUpdate::FactoryLabel(details) => {
                self.odf.merge_extraction(&details.odf);
                self.size.merge_extraction(&details.size);
                self.bom.merge_extraction(&details.bom);
            }
            ExtractionUpdate::DefectAnalysis(text) => {
                if text.is_empty() {
                    return;
                }
                let remark = if self.remark.value().is_empty() {
                    format!("AI Analysis: {}", text)
                } else {
                    format!("{}\nAI Analysis: {}", self.remark.value(), text)
                };
                self.remark.write(remark, Writer::Extraction);
            }
        }
    }

    /// Commit the draft as a new record.
    pub fn into_record(self, id: String) -> RmaRecord {
        RmaRecord {
            id,
            created_at: Utc::now(),
            status: RmaStatus::Pending,
            customer_country: self.customer_country.value,
            customer: self.customer.value,
            source: self.source.value,
            size: self.size.value,
            odf: self.odf.value,
            bom: self.bom.value,
            brand: self.brand.value,
            model_pn: self.model_pn.value,
            defect_description: self.defect_description.value,
            ver: self.ver.value,
            wc: self.wc.value,
            oc_serial_number: self.oc_serial_number.value,
            remark: self.remark.value,
            date: self.date.value,
            images: self.images,
        }
    }

    /// Write the draft back onto an existing record, preserving its
    /// identity, creation timestamp, and review status.
    pub fn apply_to_record(&self, record: &mut RmaRecord) {
        record.customer_country = self.customer_country.value.clone();
        record.customer = self.customer.value.clone();
        record.source = self.source.value.clone();
        record.size = self.size.value.clone();
        record.odf = self.odf.value.clone();
        record.bom = self.bom.value.clone();
        record.brand = self.brand.value.clone();
        record.model_pn = self.model_pn.value.clone();
        record.defect_description = self.defect_description.value.clone();
        record.ver = self.ver.value.clone();
        record.wc = self.wc.value.clone();
        record.oc_serial_number = self.oc_serial_number.value.clone();
        record.remark = self.remark.value.clone();
        record.date = self.date.value.clone();
        record.images = self.images.clone();
    }
}

impl Default for DraftForm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{FactoryDetails, OcDetails};

    #[test]
    fn test_defaults_seeded() {
        let draft = DraftForm::new();
        assert_eq!(draft.get(FormField::CustomerCountry), "ALGERIA");
        assert_eq!(draft.get(FormField::Customer), "Bomare Company");
        assert_eq!(draft.field(FormField::Odf).written_by(), Writer::Default);
        assert!(!draft.get(FormField::Date).is_empty());
    }

    #[test]
    fn test_empty_extraction_value_leaves_field_untouched() {
        let mut draft = DraftForm::new();
        draft.set_user(FormField::Size, "65\"");

        draft.apply(ExtractionUpdate::FactoryLabel(FactoryDetails {
            odf: "IDL2507002".to_string(),
            size: String::new(),
            bom: "BOM-EX-001".to_string(),
        }));

        assert_eq!(draft.get(FormField::Odf), "IDL2507002");
        assert_eq!(draft.get(FormField::Bom), "BOM-EX-001");
        // Empty extracted size must not clobber the prior value.
        assert_eq!(draft.get(FormField::Size), "65\"");
        assert_eq!(draft.field(FormField::Size).written_by(), Writer::User);
    }

    #[test]
    fn test_non_empty_extraction_clobbers_user_edit() {
        // Documented last-writer-wins hazard: this is expected behavior,
        // not a bug.
        let mut draft = DraftForm::new();
        draft.set_user(FormField::OcSerialNumber, "HAND-TYPED-123");

        draft.apply(ExtractionUpdate::OcLabel(OcDetails {
            oc_serial_number: "TA5144002917".to_string(),
            ..OcDetails::default()
        }));

        assert_eq!(draft.get(FormField::OcSerialNumber), "TA5144002917");
        assert_eq!(
            draft.field(FormField::OcSerialNumber).written_by(),
            Writer::Extraction
        );
    }

    #[test]
    fn test_updates_do_not_cross_contaminate_slots() {
        let mut draft = DraftForm::new();
        draft.set_user(FormField::Odf, "KEEP-ME");

        draft.apply(ExtractionUpdate::OcLabel(OcDetails {
            oc_serial_number: "SN1".to_string(),
            wc: "2505".to_string(),
            model_pn: "ST3151A07-2".to_string(),
            ver: "P2".to_string(),
        }));

        // An OC label update touches only its own fields.
        assert_eq!(draft.get(FormField::Odf), "KEEP-ME");
        assert_eq!(draft.get(FormField::Bom), "");
        assert_eq!(draft.get(FormField::Size), "");
        assert_eq!(draft.get(FormField::Wc), "2505");
    }

    #[test]
    fn test_category_overwrites_description() {
        let mut draft = DraftForm::new();
        draft.set_user(FormField::DefectDescription, "Bright Dot");
        draft.apply(ExtractionUpdate::DefectCategory("Vertical Line".to_string()));
        assert_eq!(draft.get(FormField::DefectDescription), "Vertical Line");
    }

    #[test]
    fn test_analysis_appends_to_remark() {
        let mut draft = DraftForm::new();
        draft.apply(ExtractionUpdate::DefectAnalysis("Line defect.".to_string()));
        assert_eq!(draft.get(FormField::Remark), "AI Analysis: Line defect.");

        draft.set_user(FormField::Remark, "Operator note.");
        draft.apply(ExtractionUpdate::DefectAnalysis("Second pass.".to_string()));
        assert_eq!(
            draft.get(FormField::Remark),
            "Operator note.\nAI Analysis: Second pass."
        );
    }

    #[test]
    fn test_record_roundtrip_preserves_identity() {
        let mut draft = DraftForm::new();
        draft.set_user(FormField::ModelPn, "CV500U5-L04");
        let record = draft.into_record("7".to_string());
        assert_eq!(record.id, "7");
        assert_eq!(record.status, RmaStatus::Pending);

        let mut edited = record.clone();
        let mut session = DraftForm::from_record(&record);
        session.set_user(FormField::Brand, "VisionPlus");
        session.apply_to_record(&mut edited);

        assert_eq!(edited.id, record.id);
        assert_eq!(edited.created_at, record.created_at);
        assert_eq!(edited.brand, "VisionPlus");
        assert_eq!(edited.model_pn, "CV500U5-L04");
    }

    #[test]
    fn test_form_field_parse() {
        assert_eq!(FormField::parse("odf"), Some(FormField::Odf));
        assert_eq!(FormField::parse("model"), Some(FormField::ModelPn));
        assert_eq!(FormField::parse("unknown-field"), None);
    }
}
