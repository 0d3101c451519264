use chrono::{Datelike, Local, NaiveDate};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Result, UteError};
use crate::handlers::ute::api::{
    ENDPOINT_BEHAVIOUR, ENDPOINT_READING_REQUEST, account_endpoint, chart_endpoint, invoices_endpoint,
    last_reading_endpoint, peak_endpoint,
};
use crate::handlers::ute::session::UteClient;
use crate::models::snapshot::{AccountSnapshot, LatestInvoice, LiveReading, MonthConsumption, PeakWindow};
use crate::models::ute_models::{
    AccountDetails, AgreementInfo, BehaviourRequest, ConsumptionChart, ConsumptionEntry, Invoice, LastReading,
    MeterReading, PeakTime, ReadingRequest, parse_amount,
};

// --------------------------------------------------------------------------------------------------------------

/// Behaviour probe that tells whether the account may pick its on-peak window.
const BEHAVIOUR_PEAK_AVAILABLE: &str = "IsPeakTimeSelectionAvailable";

const ATTRIBUTE_CURRENT: &str = "I1";
const ATTRIBUTE_VOLTAGE: &str = "V1";

// --------------------------------------------------------------------------------------------------------------
// Selection rules. Kept as free functions so they can be checked without a server.

/// Pick the "latest" invoice: the maximum by the boolean key `(year, month) <= (today.year, today.month)`.
///
/// This is a boolean max, not a date max: among all invoices not dated after the current month the last
/// one in list order wins, and when none qualifies the last invoice of the list is returned.
pub fn select_latest_invoice(invoices: &[Invoice], today: NaiveDate) -> Option<&Invoice> {
    let current = (today.year(), today.month());
    invoices
        .iter()
        .max_by_key(|invoice| (invoice.year, invoice.month) <= current)
}

/// "{month abbreviation} {year}", e.g. "Jun 2023". `None` for a month outside 1..=12.
pub fn invoice_label(invoice: &Invoice) -> Option<String> {
    NaiveDate::from_ymd_opt(invoice.year, invoice.month, 1).map(|d| d.format("%b %Y").to_string())
}

/// Pick the latest consumption entry.
///
/// The chart sometimes starts with a zero-category placeholder row. When it does and there are entries
/// with a positive id, the last of those is taken; otherwise the entry with the highest consumption
/// category wins (first one on ties).
pub fn select_latest_consumption(entries: &[ConsumptionEntry]) -> Option<&ConsumptionEntry> {
    let identified: Vec<&ConsumptionEntry> = entries.iter().filter(|e| e.id > 0).collect();
    let first_is_placeholder = entries.first().is_some_and(|e| e.category == 0);

    if first_is_placeholder {
        if let Some(last) = identified.last().copied() {
            return Some(last);
        }
    }
    entries.iter().rev().max_by_key(|e| e.category)
}

/// Turn the meter's `{attribute, value}` pairs into live values.
/// Power is voltage × current (W); energy is that power held over `sync_interval` (kWh).
/// Values that are not finite numbers are treated as missing.
pub fn live_reading_from(readings: &[MeterReading], sync_interval: Option<Duration>) -> LiveReading {
    let value_of = |attribute: &str| -> Option<f64> {
        readings
            .iter()
            .find(|r| r.attribute == attribute)
            .and_then(|r| parse_amount(&r.value))
    };

    let current_a = value_of(ATTRIBUTE_CURRENT);
    let voltage_v = value_of(ATTRIBUTE_VOLTAGE);
    let power_w = match (voltage_v, current_a) {
        (Some(v), Some(i)) => Some(v * i).filter(|p| p.is_finite()),
        _                  => None,
    };
    let energy_kwh = match (power_w, sync_interval) {
        (Some(p), Some(interval)) => Some(p * interval.as_secs_f64() / 3600.0 / 1000.0).filter(|e| e.is_finite()),
        _                         => None,
    };

    LiveReading { current_a, voltage_v, power_w, energy_kwh }
}

// --------------------------------------------------------------------------------------------------------------

impl UteClient {
    /// One scheduled tick: make sure we hold a token, then rebuild the snapshot from scratch.
    /// An access-denied answer drops the token so that the next tick logs in again.
    pub async fn refresh(&mut self, account_id: &str) -> Result<AccountSnapshot> {
        if !self.login().await? {
            return Err(UteError::malformed("token endpoint returned an empty body"));
        }

        match self.retrieve_service_account_data(account_id).await {
            Err(e @ UteError::AccessDenied { .. }) => {
                warn!("[UTE] Token rejected while refreshing account {}; it will be renewed", account_id);
                self.invalidate_token();
                Err(e)
            }
            other => other,
        }
    }

    /// Run the retrieval pipeline for one account. Stages run strictly in order and each one writes
    /// its own keys. Any HTTP error aborts the whole snapshot.
    pub async fn retrieve_service_account_data(&self, account_id: &str) -> Result<AccountSnapshot> {
        let mut snapshot = AccountSnapshot::new();

        // Step 1: contract terms.
        snapshot.merge(self.retrieve_service_agreement(account_id).await?);

        // Step 2: peak window, only for accounts that can choose one.
        if self.is_tariff_peak_available(account_id).await? {
            snapshot.merge(self.retrieve_peak_time(account_id).await?);
        } else {
            debug!("[UTE] Peak time selection not available for account {}", account_id);
        }

        // Step 3: billing.
        snapshot.merge(self.retrieve_latest_invoice_info(account_id).await?);

        // Step 4: consumption.
        snapshot.merge(self.retrieve_latest_month_consumption_info(account_id).await?);

        // Step 5: live meter values, only when the meter accepts a remote reading request.
        if self.request_reading(account_id).await? {
            snapshot.merge(self.retrieve_latest_reading_info(account_id).await?);
        } else {
            debug!("[UTE] Remote reading not supported for account {}", account_id);
        }

        info!("[UTE] Account {} refreshed with {} fields", account_id, snapshot.len());
        Ok(snapshot)
    }

    /// GET v1/accounts/{id}: the six agreement fields under `data.agreementInfo`.
    pub async fn retrieve_service_agreement(&self, account_id: &str) -> Result<AgreementInfo> {
        let path = account_endpoint(account_id);
        let response = self.session()?.get_json::<AccountDetails>(&path).await?;
        let agreement = response
            .data
            .and_then(|details| details.agreement_info)
            .ok_or_else(|| UteError::malformed(format!("'{}': no agreementInfo", path)))?;
        debug!("[UTE] Agreement: {:?}", agreement);
        Ok(agreement)
    }

    /// POST v1/misc/behaviour: whether the account may select its peak window.
    pub async fn is_tariff_peak_available(&self, account_id: &str) -> Result<bool> {
        let probe = BehaviourRequest { name: BEHAVIOUR_PEAK_AVAILABLE, account_service_point_id: account_id };
        let response = self
            .session()?
            .post_json::<_, serde_json::Value>(ENDPOINT_BEHAVIOUR, &probe)
            .await?;
        Ok(response.success)
    }

    /// GET v1/peak/{id}: the selected peak window, if any.
    pub async fn retrieve_peak_time(&self, account_id: &str) -> Result<Option<PeakWindow>> {
        let response = self.session()?.get_json::<PeakTime>(&peak_endpoint(account_id)).await?;
        Ok(response.data.and_then(|peak| peak.id_text()).map(PeakWindow))
    }

    /// GET v1/invoices/{id}/1/36: label and charges of the latest invoice.
    pub async fn retrieve_latest_invoice_info(&self, account_id: &str) -> Result<Option<LatestInvoice>> {
        let response = self.session()?.get_json::<Vec<Invoice>>(&invoices_endpoint(account_id)).await?;
        if !response.success {
            debug!("[UTE] No invoices for account {}: {}", account_id, response.error_text());
            return Ok(None);
        }

        let invoices = response.data.unwrap_or_default();
        let today    = Local::now().date_naive();
        let latest   = select_latest_invoice(&invoices, today).and_then(|invoice| {
            let label = invoice_label(invoice)?;
            Some(LatestInvoice { label, charges: invoice.total_amount })
        });
        debug!("[UTE] Latest invoice: {:?}", latest);
        Ok(latest)
    }

    /// GET v1/chart/{id}: consumption of the latest month from the first series.
    pub async fn retrieve_latest_month_consumption_info(&self, account_id: &str) -> Result<Option<MonthConsumption>> {
        let response = self.session()?.get_json::<ConsumptionChart>(&chart_endpoint(account_id)).await?;
        if !response.success {
            debug!("[UTE] No consumption chart for account {}: {}", account_id, response.error_text());
            return Ok(None);
        }

        let chart = response.data.unwrap_or_default();
        let latest = chart
            .series
            .first()
            .and_then(|series| select_latest_consumption(&series.active_consumption))
            .map(|entry| MonthConsumption(entry.value));
        debug!("[UTE] Latest month consumption: {:?}", latest);
        Ok(latest)
    }

    /// POST v1/device/readingRequest: ask the smart meter for live values. `false` when unsupported.
    pub async fn request_reading(&self, account_id: &str) -> Result<bool> {
        let request = ReadingRequest { account_service_point_id: account_id };
        let response = self
            .session()?
            .post_json::<_, serde_json::Value>(ENDPOINT_READING_REQUEST, &request)
            .await?;
        Ok(response.success)
    }

    /// Poll v1/device/{id}/lastReading/30 until the reading requested above shows up.
    ///
    /// A response with `success: false` means "not ready yet". After `max_iterations` polls the loop gives up
    /// and returns an empty reading so that a slow meter never blocks the rest of the snapshot.
    pub async fn retrieve_latest_reading_info(&self, account_id: &str) -> Result<LiveReading> {
        let path    = last_reading_endpoint(account_id);
        let options = &self.options.reading;

        for attempt in 1..=options.max_iterations {
            let response = self.session()?.get_json::<LastReading>(&path).await?;
            if response.success {
                let readings = response.data.unwrap_or_default().readings;
                let reading  = live_reading_from(&readings, options.sync_interval);
                debug!("[UTE] Live reading after {} attempt(s): {:?}", attempt, reading);
                return Ok(reading);
            }

            debug!("[UTE] Reading not ready (attempt {}/{})", attempt, options.max_iterations);
            if attempt < options.max_iterations {
                sleep(options.sleep_interval).await;
            }
        }

        warn!(
            "[UTE] No live reading for account {} after {} attempts - skipping live values",
            account_id, options.max_iterations
        );
        Ok(LiveReading::default())
    }
}

// --------------------------------------------------------------------------------------------------------------
