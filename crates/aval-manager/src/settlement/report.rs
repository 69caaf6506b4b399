use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::money::format_money;
use super::pdf::{Font, PdfDocument, PAGE_HEIGHT};
use crate::domain::{BeneficiaryKind, CommissionPayment, ServicePayment};
use crate::store::repositories::SigningNames;

const MARGIN_X: f32 = 40.0;
const TOP: f32 = PAGE_HEIGHT - 40.0;
const ROW_FLOOR: f32 = 80.0;
const SECTION_FLOOR: f32 = 120.0;
const MISSING: &str = "—";

/// Display names needed to render a batch, resolved in bulk beforehand.
#[derive(Debug, Clone, Default)]
pub struct ReportNames {
    pub signings: HashMap<Uuid, SigningNames>,
    pub guarantors: HashMap<Uuid, String>,
    pub advisors: HashMap<Uuid, String>,
}

impl ReportNames {
    fn client_of(&self, signing: Uuid) -> &str {
        self.signings
            .get(&signing)
            .and_then(|names| names.client.as_deref())
            .unwrap_or(MISSING)
    }

    fn beneficiary(&self, payment: &CommissionPayment) -> &str {
        let names = match payment.beneficiary_kind {
            BeneficiaryKind::Aval => &self.guarantors,
            BeneficiaryKind::Asesor => &self.advisors,
        };
        names
            .get(&payment.beneficiary_id)
            .map(String::as_str)
            .unwrap_or(MISSING)
    }
}

pub struct SettlementReport<'a> {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_service: Decimal,
    pub total_commissions: Decimal,
    pub services: &'a [ServicePayment],
    pub commissions: &'a [CommissionPayment],
    pub names: &'a ReportNames,
}

impl SettlementReport<'_> {
    pub fn service_lines(&self) -> Vec<String> {
        self.services
            .iter()
            .map(|payment| {
                format!(
                    "{} | Efectivo: {} | Transferencia: {} | Total: {}",
                    self.names.client_of(payment.signing_id),
                    format_money(payment.cash_amount),
                    format_money(payment.transfer_amount),
                    format_money(payment.total()),
                )
            })
            .collect()
    }

    pub fn commission_lines(&self) -> Vec<String> {
        self.commissions
            .iter()
            .map(|payment| {
                format!(
                    "{}: {} | Firma: {} | Monto: {}",
                    payment.beneficiary_kind.label(),
                    self.names.beneficiary(payment),
                    self.names.client_of(payment.signing_id),
                    format_money(payment.amount),
                )
            })
            .collect()
    }

    pub fn render(&self) -> Vec<u8> {
        let mut page = PageWriter::new();
        page.line(Font::Bold, 14.0, "Corte de pagos", 16.0);
        page.line(
            Font::Regular,
            10.0,
            &format!("Rango: {} al {}", self.start_date, self.end_date),
            14.0,
        );
        page.line(
            Font::Regular,
            10.0,
            &format!(
                "Total servicio: {} | Total comisiones: {}",
                format_money(self.total_service),
                format_money(self.total_commissions)
            ),
            20.0,
        );

        page.section(
            "Pagos del servicio",
            &self.service_lines(),
            "No se registraron pagos de servicio en este corte.",
        );
        page.section(
            "Pagos de comisiones",
            &self.commission_lines(),
            "No se registraron comisiones en este corte.",
        );
        page.finish()
    }
}

struct PageWriter {
    doc: PdfDocument,
    y: f32,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            doc: PdfDocument::new(),
            y: TOP,
        }
    }

    fn line(&mut self, font: Font, size: f32, text: &str, advance: f32) {
        self.doc.text(MARGIN_X, self.y, font, size, text);
        self.y -= advance;
    }

    fn break_page(&mut self) {
        self.doc.new_page();
        self.y = TOP;
    }

    fn section(&mut self, heading: &str, rows: &[String], empty: &str) {
        if rows.is_empty() {
            self.line(Font::Regular, 9.0, empty, 16.0);
            return;
        }
        if self.y < SECTION_FLOOR {
            self.break_page();
        }
        self.line(Font::Bold, 12.0, heading, 16.0);
        for row in rows {
            if self.y < ROW_FLOOR {
                self.break_page();
                self.line(Font::Bold, 12.0, &format!("{heading} (cont.)"), 16.0);
            }
            self.line(Font::Regular, 9.0, row, 12.0);
        }
    }

    fn finish(self) -> Vec<u8> {
        self.doc.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CommissionState, ServicePaymentState};

    fn service(signing: Uuid, cash: i64) -> ServicePayment {
        ServicePayment {
            id: Uuid::new_v4(),
            signing_id: signing,
            cash_amount: Decimal::new(cash, 2),
            transfer_amount: Decimal::ZERO,
            paid_at: None,
            receipt_path: None,
            notes: None,
            state: ServicePaymentState::Registrado,
            batch_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn rows_fall_back_to_placeholder_names() {
        let signing = Uuid::new_v4();
        let advisor = Uuid::new_v4();
        let mut names = ReportNames::default();
        names.advisors.insert(advisor, "Laura Pérez".into());
        let services = vec![service(signing, 10_050)];
        let commissions = vec![CommissionPayment {
            id: Uuid::new_v4(),
            signing_id: signing,
            beneficiary_kind: BeneficiaryKind::Asesor,
            beneficiary_id: advisor,
            amount: Decimal::new(50_000, 2),
            channel: None,
            scheduled_for: None,
            paid_at: None,
            receipt_path: None,
            notes: None,
            state: CommissionState::Pendiente,
            batch_id: None,
            created_at: None,
            updated_at: None,
        }];
        let report = SettlementReport {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid date"),
            total_service: Decimal::new(10_050, 2),
            total_commissions: Decimal::new(50_000, 2),
            services: &services,
            commissions: &commissions,
            names: &names,
        };

        assert_eq!(
            report.service_lines(),
            vec!["— | Efectivo: $100.50 | Transferencia: $0.00 | Total: $100.50"]
        );
        assert_eq!(
            report.commission_lines(),
            vec!["Asesor: Laura Pérez | Firma: — | Monto: $500.00"]
        );
    }

    #[test]
    fn long_sections_continue_on_new_pages() {
        let services: Vec<ServicePayment> =
            (0..120).map(|_| service(Uuid::new_v4(), 1_000)).collect();
        let names = ReportNames::default();
        let report = SettlementReport {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid date"),
            total_service: Decimal::new(120_000, 2),
            total_commissions: Decimal::ZERO,
            services: &services,
            commissions: &[],
            names: &names,
        };

        let bytes = report.render();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Count 3"));
        assert!(text.contains("Pagos del servicio \\(cont.\\)"));
        assert!(text.contains("No se registraron comisiones en este corte."));
    }
}
