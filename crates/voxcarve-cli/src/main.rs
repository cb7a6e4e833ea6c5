use argh::FromArgs;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use voxcarve::{
    imgproc::segmentation::{ChromaKeySegmentation, CleanPlateSegmentation, Segmentation},
    io::{calibration::read_calibration, functional::read_image_rgb8, source::open_frame_source},
    marker::RecordedMarkerDetector,
    pipeline::{Reconstruction, ReconstructionConfig},
};

#[derive(FromArgs)]
/// Reconstruct an object from calibrated, marker-tracked views and export its surface
struct Args {
    /// an image file, a directory of images or a numbered pattern such as frames/%04d.png
    #[argh(positional)]
    input: PathBuf,

    /// the directory mesh.off is written to
    #[argh(option, short = 'o', default = "PathBuf::from(\".\")")]
    output: PathBuf,

    /// the camera calibration file (JSON)
    #[argh(option, short = 'c')]
    config: PathBuf,

    /// the recorded marker observations (JSON)
    #[argh(option, short = 'm')]
    markers: PathBuf,

    /// segment against this background image
    #[argh(option)]
    cleanplate: Option<PathBuf>,

    /// gray level difference from the background image counted as object [default: 35]
    #[argh(option)]
    plate_threshold: Option<f32>,

    /// segment a green screen (default)
    #[argh(switch)]
    green: bool,

    /// segment a blue screen
    #[argh(switch)]
    blue: bool,

    /// segment a white background
    #[argh(switch)]
    white: bool,

    /// reconstruction parameters (JSON), overridden by the flags below
    #[argh(option)]
    params: Option<PathBuf>,

    /// the marker side length in meters [default: 0.05]
    #[argh(option, short = 'l')]
    marker_length: Option<f64>,

    /// number of voxels along each axis [default: 64]
    #[argh(option)]
    resolution: Option<usize>,

    /// volume size in meters as x,y,z [default: 0.1,0.1,0.05]
    #[argh(option, from_str_fn(parse_extent))]
    extent: Option<[f64; 3]>,

    /// clip the volume to the silhouette frustum before mask carving
    #[argh(switch)]
    frustum: bool,

    /// do not color the voxels nor the mesh
    #[argh(switch)]
    no_color: bool,

    /// close surfaces that touch the volume boundary
    #[argh(switch)]
    close_boundary: bool,
}

fn parse_extent(value: &str) -> Result<[f64; 3], String> {
    let values = value
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("{v}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    match values.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(format!("expected three comma separated values, got '{value}'")),
    }
}

fn reconstruction_config(args: &Args) -> Result<ReconstructionConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.params {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => ReconstructionConfig::default(),
    };

    if let Some(marker_length) = args.marker_length {
        config.marker_length = marker_length;
    }
    if let Some(resolution) = args.resolution {
        config.resolution = resolution;
    }
    if let Some(extent) = args.extent {
        config.extent = extent;
    }
    config.frustum |= args.frustum;
    config.marching_cubes.close_boundary |= args.close_boundary;
    if args.no_color {
        config.color = false;
        config.marching_cubes.color = false;
    }

    Ok(config)
}

fn segmentation(args: &Args) -> Result<Box<dyn Segmentation>, Box<dyn std::error::Error>> {
    let selected = [args.cleanplate.is_some(), args.green, args.blue, args.white]
        .iter()
        .filter(|s| **s)
        .count();
    if selected > 1 {
        return Err("choose one of --cleanplate, --green, --blue and --white".into());
    }
    if args.plate_threshold.is_some() && args.cleanplate.is_none() {
        return Err("--plate-threshold requires --cleanplate".into());
    }

    let segmentation: Box<dyn Segmentation> = match &args.cleanplate {
        Some(path) => {
            let mut plate = CleanPlateSegmentation::new(&read_image_rgb8(path)?)?;
            if let Some(threshold) = args.plate_threshold {
                plate = plate.with_threshold(threshold);
            }
            Box::new(plate)
        }
        None if args.blue => Box::new(ChromaKeySegmentation::blue()),
        None if args.white => Box::new(ChromaKeySegmentation::white()),
        None => Box::new(ChromaKeySegmentation::green()),
    };

    Ok(segmentation)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = reconstruction_config(&args)?;
    let camera = read_calibration(&args.config)?.camera_model()?;
    let mut detector = RecordedMarkerDetector::from_file(&args.markers)?;
    let mut segmentation = segmentation(&args)?;
    let mut source = open_frame_source(&args.input, camera)?;

    std::fs::create_dir_all(&args.output)?;

    // create a cancel token to stop the frame loop
    let cancel_token = Arc::new(AtomicBool::new(false));

    ctrlc::set_handler({
        let cancel_token = cancel_token.clone();
        move || {
            log::info!("Received Ctrl-C signal, finishing the current frame");
            cancel_token.store(true, Ordering::SeqCst);
        }
    })?;

    let mut reconstruction = Reconstruction::new(config, camera)?;
    reconstruction.run(
        source.as_mut(),
        &mut detector,
        segmentation.as_mut(),
        &cancel_token,
    )?;

    reconstruction.export_mesh(args.output.join("mesh.off"))?;

    Ok(())
}
