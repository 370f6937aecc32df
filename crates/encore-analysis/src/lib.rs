//! Analysis and visualization of the encore graph output.
//!
//! - [`Analyser`]: 256-point spectrum and waveform snapshots read from the
//!   graph's analyser tap, in the byte format visualizers expect
//! - [`Renderer`]: frequency bars and waveform line on a [`Surface`]
//! - [`Visualizer`] / [`VisualizationLoop`]: the frame loop thread
//!
//! ```
//! use encore_analysis::{Analyser, PixelSurface, Renderer};
//!
//! let (mut writer, reader) = encore_core::tap(1024);
//! let mut analyser = Analyser::new(reader, Default::default())?;
//! writer.push_slice(&[0.25; 256]);
//!
//! let mut surface = PixelSurface::new(320, 120);
//! Renderer::for_analyser(&analyser).render_frame(&mut analyser, &mut surface);
//! # Ok::<(), encore_analysis::Error>(())
//! ```

pub mod analyser;
pub mod error;
pub mod renderer;
pub mod surface;
pub mod visualization;

pub use analyser::{blackman_window, Analyser, AnalyserOptions};
pub use error::{Error, Result};
pub use renderer::{draw_bars, draw_waveform, overwash, Renderer};
pub use surface::{Color, Paint, PixelSurface, Rect, Surface};
pub use visualization::{shared_surface, SharedAnalyser, SharedSurface, VisualizationLoop, Visualizer};
