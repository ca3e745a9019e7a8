//! Quotation: price a submission without binding it
//!
//! Runs the same validate/adjust/price pipeline as acceptance but takes no
//! locks, allocates no numbers and persists nothing.

use biz_config::{resolve, ConfigLayers};
use chrono::Utc;
use core_kernel::ServiceResult;

use crate::adjust;
use crate::draft::AcceptRequest;
use crate::responses::{QuoteInsuredView, QuoteResponse};
use crate::schema;
use crate::services::{draft_window, ChargeBlame, PolicyService};

impl PolicyService {
    pub async fn quote(
        &self,
        producer_code: &str,
        request: AcceptRequest,
    ) -> ServiceResult<QuoteResponse> {
        let producer = self.identify_producer(producer_code).await?;
        let mut draft = schema::validate_quote(request)?;

        let (contract, product, plan) = self.resolve_catalog(&producer, &draft).await?;
        let config = resolve(ConfigLayers {
            product: product.biz_config.clone(),
            plan: plan.biz_config.clone(),
            producer: producer.biz_config.clone(),
            contract: contract.biz_config.clone(),
        })?;

        let now = Utc::now();
        schema::validate_draft(&mut draft, &config.accept, now)?;
        adjust::adjust(&mut draft, &config.accept, now)?;
        schema::validate_adjusted(&draft, &config.accept)?;
        self.charge_draft(&mut draft, &config.accept.premium, ChargeBlame::Client)?;

        let window = draft_window(&draft)?;
        Ok(QuoteResponse {
            plan_code: draft.plan_code,
            effective_time: window.effective_time,
            expiry_time: window.expiry_time,
            premium: draft.premium.unwrap_or_default(),
            insureds: draft
                .insureds
                .iter()
                .map(|i| QuoteInsuredView {
                    name: i.name.clone(),
                    premium: i.premium.unwrap_or_default(),
                })
                .collect(),
        })
    }
}
