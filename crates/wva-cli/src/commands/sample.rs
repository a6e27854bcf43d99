//! Sample command - read the current value of a data element

use anyhow::Result;
use wva_client::Wva;

use crate::output::{OutputContext, SampleRow};

pub async fn sample(wva: &Wva, name: &str, ctx: &OutputContext) -> Result<()> {
    let sample = wva.vehicle_data_element(name).sample().await?;

    ctx.print_one(&SampleRow {
        name: name.to_string(),
        value: sample.value,
        timestamp: sample.timestamp.to_rfc3339(),
    });
    Ok(())
}
