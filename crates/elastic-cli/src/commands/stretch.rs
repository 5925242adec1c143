use anyhow::{bail, Result};

use elastic_core::stretch::{adjusted_stretch, StretchFrame};
use elastic_core::ElasticConfig;

pub fn run(
    config: &ElasticConfig,
    distance: f64,
    height: Option<f64>,
    resistance: Option<f64>,
    max_stretch: Option<f64>,
) -> Result<()> {
    let mut options = config.bounce.scroll.clone();
    if let Some(r) = resistance {
        options.resistance = r;
    }
    if let Some(m) = max_stretch {
        options.max_stretch = m;
    }
    options.validate()?;

    let height = height.unwrap_or(config.simulation.container_height);
    if !height.is_finite() || height < 0.0 {
        bail!("Container height must be a non-negative number, got {}", height);
    }

    let adjusted = adjusted_stretch(distance, options.resistance);
    let frame = StretchFrame::compute(distance, options.resistance, options.max_stretch, height);

    println!("Drag:       {:.1}px over a {:.0}px container", distance, height);
    println!(
        "Options:    resistance {}, max stretch {}",
        options.resistance, options.max_stretch
    );
    println!("Adjusted:   {:.3}px", adjusted);
    println!("Scale:      {:.4}", frame.scale);
    println!("Origin:     {}", frame.origin.as_css());
    println!("Transform:  {}", frame.transform_css());

    if (frame.scale - (1.0 + options.max_stretch)).abs() < f64::EPSILON {
        println!("(capped at max stretch)");
    }

    Ok(())
}
