use client_sdk::methods::BillingSubmitPayment;
use common::PaymentRequest;
use tracing::info;

use crate::forms::{FormName, form_values_if_valid};
use crate::services::Services;
use crate::state::{Action, Dispatcher};

/// Called with the card token from the payment provider. Charges the plan
/// picked in the `payment` form.
pub async fn token_received(services: &Services, dispatch: &Dispatcher, token: String) -> bool {
    if token.trim().is_empty() {
        dispatch.message("payment token missing");
        return false;
    }

    let Some(values) = form_values_if_valid(dispatch, FormName::Payment) else {
        return false;
    };
    let plan_id = values
        .get("Plan")
        .and_then(|value| value.as_str())
        .unwrap_or_default()
        .to_string();

    if dispatch.state().remote_config.plan(&plan_id).is_none() {
        dispatch.message(format!("unknown plan: {plan_id}"));
        return false;
    }

    let request = PaymentRequest { token, plan_id };

    dispatch.dispatch(Action::SetPaymentLoading(true));
    let result = services
        .registry
        .load::<BillingSubmitPayment>(dispatch, &request)
        .await;
    dispatch.dispatch(Action::SetPaymentLoading(false));

    match result.into_result() {
        Ok(true) => {
            info!(plan = %request.plan_id, "payment accepted");
            dispatch.message(format!("subscribed to plan {}", request.plan_id));
            dispatch.redirect(&services.config.login_redirect);
            true
        }
        Ok(false) => {
            dispatch.message("payment was declined");
            false
        }
        Err(error) => {
            dispatch.message(error);
            false
        }
    }
}
