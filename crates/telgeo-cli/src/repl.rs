//! REPL – interactive geometry queries.
//!
//! Supported slash-commands:
//!   /help                              – show this list
//!   /planes                            – list planes in z-order
//!   /locate X Y Z                      – sensor containing a global point
//!   /to-global ID X Y Z                – sensor-local point → global
//!   /to-local [ID] X Y Z               – global point → local frame
//!   /matrix X Y Z                      – placement matrix at a point
//!   /normal ID                         – plane normal
//!   /radlen X1 Y1 Z1 X2 Y2 Z2 [skip|noskip] – radiation length along a segment
//!   /dump PATH                         – export the model as JSON
//!   /quit | /exit                      – leave
//!
//! Lookups that miss print the numeric sentinels downstream tools expect
//! (-999 for an unknown sensor, -999.0 for unknown scalars, -1 for z-order).

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use telgeo_geometry::Vec3;
use telgeo_telescope::{GeometryService, ZOrderMap};
use telgeo_types::{Sentinel, SensorId};

use crate::config::Config;

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Planes,
    Locate(Vec3),
    ToGlobal { sensor: SensorId, local: Vec3 },
    ToLocal { sensor: Option<SensorId>, point: Vec3 },
    Matrix(Vec3),
    Normal(SensorId),
    RadLen { start: Vec3, finish: Vec3, skip: Option<bool> },
    Dump(String),
    Quit,
}

/// Parse one input line.  Errors carry a usage hint.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = words.collect();

    match head {
        "/help" => Ok(Command::Help),
        "/planes" => Ok(Command::Planes),
        "/quit" | "/exit" => Ok(Command::Quit),
        "/locate" => Ok(Command::Locate(point(&args, "/locate X Y Z")?)),
        "/matrix" => Ok(Command::Matrix(point(&args, "/matrix X Y Z")?)),
        "/normal" => match args.as_slice() {
            [id] => Ok(Command::Normal(sensor(id)?)),
            _ => Err("usage: /normal ID".to_string()),
        },
        "/to-global" => match args.as_slice() {
            [id, rest @ ..] => Ok(Command::ToGlobal {
                sensor: sensor(id)?,
                local: point(rest, "/to-global ID X Y Z")?,
            }),
            [] => Err("usage: /to-global ID X Y Z".to_string()),
        },
        "/to-local" => match args.as_slice() {
            [id, rest @ ..] if rest.len() == 3 => Ok(Command::ToLocal {
                sensor: Some(sensor(id)?),
                point: point(rest, "/to-local [ID] X Y Z")?,
            }),
            _ => Ok(Command::ToLocal {
                sensor: None,
                point: point(&args, "/to-local [ID] X Y Z")?,
            }),
        },
        "/radlen" => {
            const USAGE: &str = "/radlen X1 Y1 Z1 X2 Y2 Z2 [skip|noskip]";
            let skip = match args.get(6).copied() {
                None => None,
                Some("skip") => Some(true),
                Some("noskip") => Some(false),
                Some(other) => return Err(format!("unknown flag '{other}'; usage: {USAGE}")),
            };
            if args.len() < 6 || args.len() > 7 {
                return Err(format!("usage: {USAGE}"));
            }
            Ok(Command::RadLen {
                start: point(&args[..3], USAGE)?,
                finish: point(&args[3..6], USAGE)?,
                skip,
            })
        }
        "/dump" => match args.as_slice() {
            [path] => Ok(Command::Dump((*path).to_string())),
            _ => Err("usage: /dump PATH".to_string()),
        },
        other => Err(format!("unknown command '{other}'")),
    }
}

fn point(args: &[&str], usage: &str) -> Result<Vec3, String> {
    let &[x, y, z] = args else {
        return Err(format!("usage: {usage}"));
    };
    let num = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| format!("'{s}' is not a number; usage: {usage}"))
    };
    Ok(Vec3::new(num(x)?, num(y)?, num(z)?))
}

fn sensor(raw: &str) -> Result<SensorId, String> {
    raw.parse::<SensorId>()
        .map_err(|_| format!("'{raw}' is not a sensor ID"))
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(shutdown: Arc<AtomicBool>, service: &GeometryService, cfg: &Config) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "telgeo>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_command(line) {
            Ok(Command::Quit) => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Ok(cmd) => execute(cmd, service, cfg),
            Err(msg) => println!(
                "{} {}. Type {} for available commands.",
                "Error:".red(),
                msg.yellow(),
                "/help".bold()
            ),
        }
    }
}

fn execute(cmd: Command, service: &GeometryService, cfg: &Config) {
    match cmd {
        Command::Help => cmd_help(),
        Command::Planes => cmd_planes(service),
        Command::Locate(p) => match service.sensor_id_at(p) {
            Ok(id) => println!("  sensor {}", id.or_sentinel().to_string().bold()),
            Err(e) => report(e),
        },
        Command::ToGlobal { sensor, local } => match service.local_to_global(sensor, local) {
            Ok(Some(g)) => println!("  global {}", fmt_vec(g).bold()),
            Ok(None) => unknown_sensor(sensor),
            Err(e) => report(e),
        },
        Command::ToLocal { sensor: None, point } => match service.global_to_local(point) {
            Ok(l) => println!("  local {}", fmt_vec(l).bold()),
            Err(e) => report(e),
        },
        Command::ToLocal { sensor: Some(id), point } => {
            match service.queries().map(|q| q.global_to_local_in(id, point)) {
                Ok(Some(l)) => println!("  local {}", fmt_vec(l).bold()),
                Ok(None) => unknown_sensor(id),
                Err(e) => report(e),
            }
        }
        Command::Matrix(p) => match service.transform_at(p) {
            Ok(t) => {
                for row in t.to_homogeneous() {
                    println!(
                        "  {:>12.6} {:>12.6} {:>12.6} {:>12.6}",
                        row[0], row[1], row[2], row[3]
                    );
                }
            }
            Err(e) => report(e),
        },
        Command::Normal(id) => {
            let n = service.registry().plane_normal(id);
            if n.is_none() {
                unknown_sensor(id);
            }
            println!("  normal {}", fmt_vec(n.unwrap_or_else(Vec3::zero)).bold());
        }
        Command::RadLen { start, finish, skip } => {
            let skip = skip.unwrap_or(cfg.skip_boundary_volumes);
            match service.integrator() {
                Ok(integ) => {
                    let r = integ.trace(start, finish, skip);
                    println!(
                        "  {} X0 over {:.3} mm ({} steps, {:?})",
                        format!("{:.6}", r.radiation_lengths).bold(),
                        r.length,
                        r.steps,
                        r.termination
                    );
                }
                Err(e) => report(e),
            }
        }
        Command::Dump(path) => match service.export_model(Path::new(&path)) {
            Ok(()) => println!("{} {}", "✓ Geometry written to".green(), path.bold()),
            Err(e) => report(e),
        },
        Command::Quit => {}
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Geometry Commands".bold().underline());
    println!("  {}  – list planes in z-order", "/planes".bold().cyan());
    println!("  {}  – sensor containing a global point", "/locate X Y Z".bold().cyan());
    println!("  {}  – sensor-local point to global", "/to-global ID X Y Z".bold().cyan());
    println!("  {}  – global point to local frame", "/to-local [ID] X Y Z".bold().cyan());
    println!("  {}  – placement matrix at a point", "/matrix X Y Z".bold().cyan());
    println!("  {}  – plane normal", "/normal ID".bold().cyan());
    println!(
        "  {}  – radiation length between two points",
        "/radlen X1 Y1 Z1 X2 Y2 Z2 [skip|noskip]".bold().cyan()
    );
    println!("  {}  – export the model as JSON", "/dump PATH".bold().cyan());
    println!("  {}  – exit", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_planes(service: &GeometryService) {
    let reg = service.registry();
    println!("{}", "Planes".bold().underline());
    println!(
        "  {:>5} {:>4}  {:<28} {:<28} {:<24} {:>8}",
        "id", "z#", "position [mm]", "rotation [rad]", "size [mm]", "X0 [cm]"
    );
    for id in reg.z_order_map().ids_by_z() {
        let Some(plane) = reg.plane(id) else { continue };
        let line = format!(
            "  {:>5} {:>4}  {:<28} {:<28} {:<24} {:>8.3}",
            id,
            reg.z_order_of(id).or_sentinel(),
            fmt_vec(plane.position),
            fmt_vec(plane.rotation),
            fmt_vec(plane.size),
            plane.radiation_length
        );
        if plane.is_dut {
            println!("{} {}", line, "DUT".yellow());
        } else {
            println!("{line}");
        }
    }
    for (id, listed) in coincident_planes(reg.z_order_map()) {
        println!(
            "  {} shares z-order with {} and is not listed",
            id.to_string().yellow(),
            listed
        );
    }
    println!("  magnetic field [T] {}", fmt_vec(service.magnetic_field()));
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// `(hidden, listed)` pairs for planes whose z-order slot is held by another.
fn coincident_planes(map: &ZOrderMap) -> Vec<(SensorId, SensorId)> {
    map.iter()
        .filter_map(|(id, rank)| match map.id_at(rank) {
            Some(listed) if listed != id => Some((id, listed)),
            _ => None,
        })
        .collect()
}

fn fmt_vec(v: Vec3) -> String {
    format!("({:.4}, {:.4}, {:.4})", v.x, v.y, v.z)
}

fn unknown_sensor(id: SensorId) {
    println!("  {} {}", "unknown sensor".yellow(), id);
}

fn report(e: telgeo_types::GeoError) {
    println!("{}: {}", "Error".red(), e);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse_command("/help"), Ok(Command::Help));
        assert_eq!(parse_command("  /planes  "), Ok(Command::Planes));
        assert_eq!(parse_command("/exit"), Ok(Command::Quit));
    }

    #[test]
    fn parses_points() {
        assert_eq!(
            parse_command("/locate 1 -2.5 300"),
            Ok(Command::Locate(Vec3::new(1.0, -2.5, 300.0)))
        );
        assert!(parse_command("/locate 1 2").is_err());
        assert!(parse_command("/matrix a b c").is_err());
    }

    #[test]
    fn parses_sensor_frame_commands() {
        assert_eq!(
            parse_command("/to-global 12 0 0 0"),
            Ok(Command::ToGlobal { sensor: 12, local: Vec3::zero() })
        );
        assert_eq!(
            parse_command("/to-local 1 2 3"),
            Ok(Command::ToLocal { sensor: None, point: Vec3::new(1.0, 2.0, 3.0) })
        );
        assert_eq!(
            parse_command("/to-local 7 1 2 3"),
            Ok(Command::ToLocal { sensor: Some(7), point: Vec3::new(1.0, 2.0, 3.0) })
        );
        assert_eq!(parse_command("/normal 3"), Ok(Command::Normal(3)));
        assert!(parse_command("/normal x").is_err());
        assert!(parse_command("/to-global").is_err());
    }

    #[test]
    fn parses_radlen_with_optional_flag() {
        let cmd = parse_command("/radlen 0 0 -10 0 0 510").unwrap();
        assert_eq!(
            cmd,
            Command::RadLen {
                start: Vec3::new(0.0, 0.0, -10.0),
                finish: Vec3::new(0.0, 0.0, 510.0),
                skip: None
            }
        );
        match parse_command("/radlen 0 0 0 0 0 1 skip").unwrap() {
            Command::RadLen { skip, .. } => assert_eq!(skip, Some(true)),
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_command("/radlen 0 0 0 0 0 1 sometimes").is_err());
        assert!(parse_command("/radlen 0 0 0").is_err());
    }

    #[test]
    fn rejects_unknown_commands() {
        let err = parse_command("/teleport 1 2 3").unwrap_err();
        assert!(err.contains("/teleport"));
        assert!(parse_command("/dump").is_err());
        assert_eq!(parse_command("/dump out.json"), Ok(Command::Dump("out.json".to_string())));
    }

    #[test]
    fn coincident_planes_names_the_hidden_ones() {
        let plane = |id, z| telgeo_telescope::Plane {
            id,
            position: Vec3::new(0.0, 0.0, z),
            rotation: Vec3::zero(),
            size: Vec3::new(20.0, 10.0, 0.05),
            radiation_length: 9.37,
            is_dut: false,
        };
        let planes = [plane(3, 0.0), plane(1, 150.0), plane(2, 150.0), plane(4, 300.0)];
        let map = ZOrderMap::from_planes(&planes).unwrap();
        assert_eq!(coincident_planes(&map), vec![(2, 1)]);

        let apart = ZOrderMap::from_planes(&planes[..2]).unwrap();
        assert!(coincident_planes(&apart).is_empty());
    }
}
