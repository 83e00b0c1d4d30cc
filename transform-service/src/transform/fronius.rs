//! Fronius local Solar API JSON: `Head.Timestamp` plus one of three
//! `Body.Data` shapes — site power flow, inverter realtime data, or a
//! smart-meter reading.

use serde_json::Value;

use odse_schema::{CanonicalRecord, ErrorType};

use crate::taxonomy;

use super::{
    clamp_pf, field_f64, field_token, json_i64, non_negative, parse_timestamp, AccessClass,
    OemTransform, PayloadKind, RecordStream, SourceDescriptor, TransformError, TransformOptions,
};

pub struct Fronius;

static DESCRIPTOR: SourceDescriptor = SourceDescriptor {
    id: "fronius",
    payload: PayloadKind::Json,
    access: AccessClass::Demo,
};

const SOURCE: &str = "fronius";

impl OemTransform for Fronius {
    fn descriptor(&self) -> &'static SourceDescriptor {
        &DESCRIPTOR
    }

    fn transform(
        &self,
        raw: &str,
        opts: &TransformOptions,
    ) -> Result<RecordStream, TransformError> {
        let payload: Value = serde_json::from_str(raw)
            .map_err(|e| TransformError::malformed(SOURCE, "payload", e.to_string()))?;
        let assumed = opts.assumed_offset()?;
        let interval_hours = opts.interval_hours(5.0);

        let head = payload.get("Head").cloned().unwrap_or(Value::Null);
        let ts_text = field_token(&head, "Timestamp").ok_or_else(|| {
            TransformError::malformed(SOURCE, "Head.Timestamp", "required field missing")
        })?;
        let ts = parse_timestamp(&ts_text, assumed).ok_or_else(|| {
            TransformError::malformed(SOURCE, "Head.Timestamp", format!("unparseable '{ts_text}'"))
        })?;

        let data = payload
            .get("Body")
            .and_then(|body| body.get("Data"))
            .cloned()
            .unwrap_or(Value::Null);

        let mut rec = if let Some(site) = data.get("Site").filter(|v| v.is_object()) {
            let p_pv = field_f64(site, "P_PV");
            let e_day = field_f64(site, "E_Day");
            let status_code = head
                .get("Status")
                .and_then(|status| status.get("Code"))
                .and_then(json_i64);
            let error_type = match status_code {
                None | Some(0) => ErrorType::Normal,
                Some(_) => ErrorType::Warning,
            };

            let kwh = energy_or_power(e_day, "E_Day", p_pv, "P_PV", interval_hours)?;
            let mut rec = CanonicalRecord::new(ts, kwh, error_type);
            rec.error_code = status_code.map(|c| c.to_string());
            rec.kw = p_pv.map(|w| w / 1000.0);
            rec
        } else if data.get("PAC").is_some() {
            let pac = data.get("PAC").and_then(|v| field_f64(v, "Value"));
            let sac = data.get("SAC").and_then(|v| field_f64(v, "Value"));
            let day_energy = data.get("DAY_ENERGY").and_then(|v| field_f64(v, "Value"));
            let device_status = data.get("DeviceStatus").cloned().unwrap_or(Value::Null);
            let status_code = device_status.get("StatusCode").and_then(json_i64);

            let kwh = energy_or_power(day_energy, "DAY_ENERGY", pac, "PAC", interval_hours)?;
            let mut rec = CanonicalRecord::new(ts, kwh, taxonomy::fronius_status(status_code));
            rec.error_code = field_token(&device_status, "ErrorCode");
            rec.kw = pac.map(|w| w / 1000.0);
            rec.kva = sac.map(|w| w / 1000.0);
            if let (Some(p), Some(s)) = (pac, sac) {
                if s > 0.0 {
                    rec.pf = Some(clamp_pf(p / s));
                }
            }
            rec
        } else if data.get("PowerReal_P_Sum").is_some() {
            let p = field_f64(&data, "PowerReal_P_Sum");
            let s = field_f64(&data, "PowerApparent_S_Sum");
            let q = field_f64(&data, "PowerReactive_Q_Sum");
            let e = field_f64(&data, "EnergyReal_WAC_Sum_Produced");
            let pf = field_f64(&data, "PowerFactor_Sum");

            let kwh = energy_or_power(
                e,
                "EnergyReal_WAC_Sum_Produced",
                p,
                "PowerReal_P_Sum",
                interval_hours,
            )?;
            let mut rec = CanonicalRecord::new(ts, kwh, ErrorType::Normal);
            rec.kw = p.map(|w| w / 1000.0);
            rec.kva = s.map(|w| w / 1000.0);
            rec.kvar = q.map(|w| w / 1000.0);
            rec.pf = pf.map(clamp_pf);
            rec
        } else {
            return Err(TransformError::malformed(
                SOURCE,
                "Body.Data",
                "no Site, PAC, or PowerReal_P_Sum block in payload",
            ));
        };

        rec.asset_id = opts.asset_id.clone();
        Ok(Box::new(std::iter::once(Ok(rec))))
    }
}

/// kWh from a watt-hour energy reading, falling back to power × interval
/// when the energy field is absent. Whichever reading is used must be
/// non-negative.
fn energy_or_power(
    energy_wh: Option<f64>,
    energy_field: &'static str,
    power_w: Option<f64>,
    power_field: &'static str,
    interval_hours: f64,
) -> Result<f64, TransformError> {
    if let Some(e) = energy_wh {
        return Ok(non_negative(SOURCE, energy_field, e)? / 1000.0);
    }
    if let Some(p) = power_w {
        return Ok(non_negative(SOURCE, power_field, p)? / 1000.0 * interval_hours);
    }
    Err(TransformError::malformed(
        SOURCE,
        energy_field,
        format!("neither {energy_field} nor {power_field} present"),
    ))
}
