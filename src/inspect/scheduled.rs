// src/inspect/scheduled.rs

//! Scheduled-task inspector: cron in all its habitats, existing systemd
//! timers, and pending at-jobs.
//!
//! Cron entries are converted to timer/service unit pairs where the
//! expression maps cleanly onto OnCalendar; the rest get FIXME-marked
//! units so nothing silently disappears in the migration.

use super::{rel_path, safe_iterdir, safe_read, Context, Inspector};
use crate::snapshot::{
    AtJob, CronEntry, GeneratedTimer, ScheduledSection, Snapshot, TimerSource, TimerUnit,
};
use regex::Regex;
use std::path::Path;

pub struct ScheduledInspector;

impl Inspector for ScheduledInspector {
    fn name(&self) -> &'static str {
        "scheduled"
    }

    fn run(&self, ctx: &Context, snapshot: &mut Snapshot) {
        let mut section = ScheduledSection::default();

        scan_cron_dir(ctx, "etc/cron.d", "cron.d", true, &mut section);
        let crontab = ctx.host_path("etc/crontab");
        if crontab.is_file() {
            scan_cron_file(ctx, &crontab, "crontab", true, &mut section);
        }
        scan_periodic_dirs(ctx, &mut section);
        scan_user_spool(ctx, &mut section);

        for (dir, source) in [
            ("etc/systemd/system", TimerSource::Local),
            ("usr/lib/systemd/system", TimerSource::Vendor),
        ] {
            scan_timers(ctx, dir, source, &mut section);
        }

        scan_at_jobs(ctx, &mut section);

        snapshot.scheduled = Some(section);
    }
}

// =============================================================================
// Cron expression conversion
// =============================================================================

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Minute,
    Hour,
    Dom,
    Month,
    Dow,
}

fn convert_field(field: &str, kind: Field) -> String {
    if field == "*" {
        return "*".into();
    }
    // Step values: minute */5 keeps its form, hour */2 becomes 00/2
    if let Some(step) = field.strip_prefix("*/") {
        if step.chars().all(|c| c.is_ascii_digit()) {
            return match kind {
                Field::Minute => format!("*/{step}"),
                Field::Hour => format!("00/{step}"),
                _ => field.into(),
            };
        }
        return field.into();
    }
    // Ranges: 1-5 becomes 1..5
    if let Some((lo, hi)) = field.split_once('-') {
        if !field.contains('/')
            && lo.chars().all(|c| c.is_ascii_digit())
            && hi.chars().all(|c| c.is_ascii_digit())
        {
            return format!("{lo}..{hi}");
        }
    }
    // Lists keep their syntax
    if field.contains(',') {
        return field.into();
    }
    // Numeric day of week becomes a name
    if kind == Field::Dow {
        const DOW: [&str; 8] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
        if let Ok(n) = field.parse::<usize>() {
            if n < DOW.len() {
                return DOW[n].into();
            }
        }
    }
    if let Ok(n) = field.parse::<u32>() {
        if matches!(kind, Field::Minute | Field::Hour) {
            return format!("{n:02}");
        }
    }
    field.into()
}

/// Convert a 5-field cron expression (or @shortcut) to OnCalendar.
///
/// Returns (calendar, converted). `converted == false` means a placeholder
/// was substituted and the generated unit carries a FIXME.
pub fn cron_to_calendar(expr: &str) -> (String, bool) {
    let expr = expr.trim();
    match expr.to_lowercase().as_str() {
        "@yearly" | "@annually" => return ("*-01-01 00:00:00".into(), true),
        "@monthly" => return ("*-*-01 00:00:00".into(), true),
        "@weekly" => return ("Mon *-*-* 00:00:00".into(), true),
        "@daily" | "@midnight" => return ("*-*-* 00:00:00".into(), true),
        "@hourly" => return ("*-*-* *:00:00".into(), true),
        "@reboot" => return ("@reboot".into(), false),
        _ => {}
    }

    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() < 5 {
        return ("*-*-* 02:00:00".into(), false);
    }
    let minute = convert_field(fields[0], Field::Minute);
    let hour = convert_field(fields[1], Field::Hour);
    let dom = convert_field(fields[2], Field::Dom);
    let month = convert_field(fields[3], Field::Month);
    let dow = convert_field(fields[4], Field::Dow);

    let date = format!("*-{month}-{dom}");
    let time = format!("{hour}:{minute}:00");
    if dow != "*" {
        (format!("{dow} {date} {time}"), true)
    } else {
        (format!("{date} {time}"), true)
    }
}

fn make_units(name: &str, cron_expr: &str, source_path: &str, command: &str) -> GeneratedTimer {
    let (mut on_calendar, converted) = cron_to_calendar(cron_expr);
    let mut fixme = String::new();
    if !converted {
        if on_calendar == "@reboot" {
            fixme = "# FIXME: @reboot has no OnCalendar equivalent; use a oneshot service \
                     with WantedBy=multi-user.target instead.\n"
                .into();
            on_calendar = "*-*-* 02:00:00".into();
        } else {
            fixme = format!(
                "# FIXME: cron expression '{cron_expr}' could not be fully converted; \
                 review the OnCalendar value below.\n"
            );
        }
    }

    let timer_content = format!(
        "[Unit]\nDescription=Converted from cron: {source_path}\n# Original schedule: {cron_expr}\n{fixme}\n\
         [Timer]\nOnCalendar={on_calendar}\nPersistent=true\n\n\
         [Install]\nWantedBy=timers.target\n"
    );
    let exec_line = if command.is_empty() {
        "ExecStart=/bin/true\n# FIXME: could not extract the command from the cron entry".into()
    } else {
        format!("ExecStart={command}")
    };
    let service_content = format!(
        "[Unit]\nDescription=Converted from cron: {source_path}\n\n\
         [Service]\nType=oneshot\n{exec_line}\n"
    );

    GeneratedTimer {
        name: name.into(),
        cron_expr: cron_expr.into(),
        on_calendar,
        source_path: source_path.into(),
        command: command.into(),
        timer_content,
        service_content,
        converted,
    }
}

// =============================================================================
// Cron scanning
// =============================================================================

fn scan_cron_dir(
    ctx: &Context,
    dir: &str,
    source: &str,
    has_user_field: bool,
    section: &mut ScheduledSection,
) {
    for path in safe_iterdir(&ctx.host_path(dir)) {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if path.is_file() && !name.starts_with('.') {
            scan_cron_file(ctx, &path, source, has_user_field, section);
        }
    }
}

fn scan_cron_file(
    ctx: &Context,
    path: &Path,
    source: &str,
    has_user_field: bool,
    section: &mut ScheduledSection,
) {
    let rel = rel_path(ctx.host_root, path);
    let text = safe_read(path);
    let entry_re = Regex::new(r"^[\d*@]").unwrap();

    // User crontabs in the spool carry the user in the filename instead
    let spool_user = source
        .starts_with("spool")
        .then(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .unwrap_or_default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || !entry_re.is_match(line) {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (schedule, user, command) = if line.starts_with('@') {
            let user = if has_user_field {
                fields.get(1).unwrap_or(&"").to_string()
            } else {
                spool_user.clone()
            };
            let skip = if has_user_field { 2 } else { 1 };
            (
                fields[0].to_string(),
                user,
                fields.get(skip..).unwrap_or(&[]).join(" "),
            )
        } else {
            if fields.len() < 6 {
                continue;
            }
            let schedule = fields[..5].join(" ");
            if has_user_field {
                (
                    schedule,
                    fields[5].to_string(),
                    fields.get(6..).unwrap_or(&[]).join(" "),
                )
            } else {
                (schedule, spool_user.clone(), fields[5..].join(" "))
            }
        };

        section.cron_entries.push(CronEntry {
            path: rel.clone(),
            source: source.to_string(),
            schedule: schedule.clone(),
            command: command.clone(),
            user,
        });

        let safe_name = format!(
            "cron-{}",
            path.file_name()
                .map(|n| n.to_string_lossy().replace('.', "-"))
                .unwrap_or_default()
        );
        section
            .generated
            .push(make_units(&safe_name, &schedule, &rel, &command));
    }
}

/// cron.{hourly,daily,weekly,monthly} scripts get fixed calendars matching
/// the anacron defaults.
fn scan_periodic_dirs(ctx: &Context, section: &mut ScheduledSection) {
    const PERIODS: [(&str, &str); 4] = [
        ("hourly", "*-*-* *:01:00"),
        ("daily", "*-*-* 03:00:00"),
        ("weekly", "Mon *-*-* 03:00:00"),
        ("monthly", "*-*-01 03:00:00"),
    ];
    for (period, calendar) in PERIODS {
        let dir = ctx.host_path(&format!("etc/cron.{period}"));
        for path in safe_iterdir(&dir) {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if !path.is_file() || name.starts_with('.') {
                continue;
            }
            let rel = rel_path(ctx.host_root, &path);
            let command = format!("/{rel}");
            section.cron_entries.push(CronEntry {
                path: rel.clone(),
                source: format!("cron.{period}"),
                schedule: format!("@{period}"),
                command: command.clone(),
                user: "root".into(),
            });
            let safe_name = format!("cron-{period}-{}", name.replace('.', "-"));
            let timer_content = format!(
                "[Unit]\nDescription=Converted from cron.{period}: {rel}\n\n\
                 [Timer]\nOnCalendar={calendar}\nPersistent=true\n\n\
                 [Install]\nWantedBy=timers.target\n"
            );
            let service_content = format!(
                "[Unit]\nDescription=Converted from cron.{period}: {rel}\n\n\
                 [Service]\nType=oneshot\nExecStart={command}\n"
            );
            section.generated.push(GeneratedTimer {
                name: safe_name,
                cron_expr: format!("@{period}"),
                on_calendar: calendar.into(),
                source_path: rel,
                command,
                timer_content,
                service_content,
                converted: true,
            });
        }
    }
}

fn scan_user_spool(ctx: &Context, section: &mut ScheduledSection) {
    let spool = ctx.host_path("var/spool/cron");
    for path in safe_iterdir(&spool) {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if path.is_file() && !name.starts_with('.') {
            scan_cron_file(ctx, &path, &format!("spool ({name})"), false, section);
        }
    }
}

// =============================================================================
// Existing timers
// =============================================================================

fn unit_field(text: &str, field: &str) -> String {
    let prefix = format!("{field}=");
    for line in text.lines() {
        if let Some(value) = line.trim().strip_prefix(&prefix) {
            return value.trim().to_string();
        }
    }
    String::new()
}

fn scan_timers(ctx: &Context, dir: &str, source: TimerSource, section: &mut ScheduledSection) {
    for path in safe_iterdir(&ctx.host_path(dir)) {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !path.is_file() || !name.ends_with(".timer") {
            continue;
        }
        let timer_content = safe_read(&path);
        if timer_content.is_empty() {
            continue;
        }
        let stem = name.trim_end_matches(".timer").to_string();
        let service_path = path.with_extension("service");
        let service_content = safe_read(&service_path);

        section.timers.push(TimerUnit {
            name: stem,
            source,
            on_calendar: unit_field(&timer_content, "OnCalendar"),
            exec_start: unit_field(&service_content, "ExecStart"),
            description: unit_field(&timer_content, "Description"),
            path: rel_path(ctx.host_root, &path),
            // Vendor unit bodies ship with the base image; only local ones
            // need carrying.
            timer_content: match source {
                TimerSource::Local => timer_content,
                TimerSource::Vendor => String::new(),
            },
            service_content: match source {
                TimerSource::Local => service_content,
                TimerSource::Vendor => String::new(),
            },
        });
    }
}

// =============================================================================
// At jobs
// =============================================================================

fn scan_at_jobs(ctx: &Context, section: &mut ScheduledSection) {
    let spool = ctx.host_path("var/spool/at");
    for path in safe_iterdir(&spool) {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if path.is_file() && !name.starts_with('.') && name != ".SEQ" {
            section.at_jobs.push(parse_at_job(ctx, &path));
        }
    }
}

/// Strip the shell preamble at(1) writes and keep the payload commands.
fn parse_at_job(ctx: &Context, path: &Path) -> AtJob {
    let rel = rel_path(ctx.host_root, path);
    let text = safe_read(path);
    let uid_re = Regex::new(r"# atrun uid=(\d+)").unwrap();

    let mut user = String::new();
    let mut working_dir = String::new();
    let mut commands: Vec<String> = Vec::new();
    let mut in_preamble = true;

    for line in text.lines() {
        let line = line.trim();
        if let Some(caps) = uid_re.captures(line) {
            user = format!("uid={}", &caps[1]);
        }
        if let Some(rest) = line.strip_prefix("# mail ") {
            if let Some(name) = rest.split_whitespace().next() {
                user = name.to_string();
            }
        }
        if in_preamble {
            if let Some(rest) = line.strip_prefix("cd ") {
                working_dir = rest.split("||").next().unwrap_or("").trim().to_string();
                continue;
            }
            let preamble = line.is_empty()
                || line.starts_with('#')
                || line.starts_with("umask")
                || line.starts_with("SHELL=")
                || line.contains("export")
                || line.starts_with("exit")
                || line == "}";
            if preamble {
                continue;
            }
            in_preamble = false;
        }
        if !line.is_empty() {
            commands.push(line.to_string());
        }
    }

    AtJob {
        file: rel,
        command: commands.join("; "),
        user,
        working_dir,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::FakeRunner;
    use crate::snapshot::{Baseline, WarningSink};
    use std::fs;

    #[test]
    fn nightly_cron_maps_to_calendar() {
        let (calendar, converted) = cron_to_calendar("0 3 * * *");
        assert!(converted);
        assert_eq!(calendar, "*-*-* 03:00:00");
    }

    #[test]
    fn cron_steps_ranges_lists_and_dow() {
        assert_eq!(cron_to_calendar("*/5 * * * *").0, "*-*-* *:*/5:00");
        assert_eq!(cron_to_calendar("0 */2 * * *").0, "*-*-* 00/2:00:00");
        assert_eq!(cron_to_calendar("30 6 * * 1-5").0, "1..5 *-*-* 06:30:00");
        assert_eq!(cron_to_calendar("15 0 1,15 * *").0, "*-*-1,15 00:15:00");
        assert_eq!(cron_to_calendar("0 12 * * 0").0, "Sun *-*-* 12:00:00");
        assert_eq!(cron_to_calendar("@daily").0, "*-*-* 00:00:00");
    }

    #[test]
    fn reboot_entries_are_flagged_not_converted() {
        let unit = make_units("cron-x", "@reboot", "etc/cron.d/x", "/opt/x/start.sh");
        assert!(!unit.converted);
        assert!(unit.timer_content.contains("FIXME"));
    }

    #[test]
    fn crontab_entry_produces_timer_and_service_pair() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(
            dir.path().join("etc/crontab"),
            "SHELL=/bin/bash\n0 3 * * * root /usr/local/bin/backup.sh\n",
        )
        .unwrap();

        let runner = FakeRunner::new();
        let config = crate::inspect::InspectConfig::default();
        let baseline = Baseline::empty();
        let warnings = WarningSink::new();
        let ctx = Context {
            host_root: dir.path(),
            config: &config,
            runner: &runner,
            bridge: None,
            baseline: &baseline,
            warnings: &warnings,
        };
        let mut snapshot = Snapshot::new();
        ScheduledInspector.run(&ctx, &mut snapshot);

        let section = snapshot.scheduled.unwrap();
        assert_eq!(section.cron_entries.len(), 1);
        let entry = &section.cron_entries[0];
        assert_eq!(entry.schedule, "0 3 * * *");
        assert_eq!(entry.user, "root");
        assert_eq!(entry.command, "/usr/local/bin/backup.sh");

        assert_eq!(section.generated.len(), 1);
        let unit = &section.generated[0];
        assert!(unit.converted);
        assert_eq!(unit.on_calendar, "*-*-* 03:00:00");
        assert!(unit.timer_content.contains("OnCalendar=*-*-* 03:00:00"));
        assert!(unit
            .service_content
            .contains("ExecStart=/usr/local/bin/backup.sh"));
    }

    #[test]
    fn local_and_vendor_timers_are_labeled() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("etc/systemd/system");
        let vendor = dir.path().join("usr/lib/systemd/system");
        fs::create_dir_all(&local).unwrap();
        fs::create_dir_all(&vendor).unwrap();
        fs::write(
            local.join("sync.timer"),
            "[Unit]\nDescription=Sync\n[Timer]\nOnCalendar=hourly\n",
        )
        .unwrap();
        fs::write(
            local.join("sync.service"),
            "[Service]\nExecStart=/usr/local/bin/sync.sh\n",
        )
        .unwrap();
        fs::write(
            vendor.join("logrotate.timer"),
            "[Unit]\nDescription=Rotate\n[Timer]\nOnCalendar=daily\n",
        )
        .unwrap();

        let runner = FakeRunner::new();
        let config = crate::inspect::InspectConfig::default();
        let baseline = Baseline::empty();
        let warnings = WarningSink::new();
        let ctx = Context {
            host_root: dir.path(),
            config: &config,
            runner: &runner,
            bridge: None,
            baseline: &baseline,
            warnings: &warnings,
        };
        let mut snapshot = Snapshot::new();
        ScheduledInspector.run(&ctx, &mut snapshot);

        let section = snapshot.scheduled.unwrap();
        let local_timer = section
            .timers
            .iter()
            .find(|t| t.name == "sync")
            .unwrap();
        assert_eq!(local_timer.source, TimerSource::Local);
        assert_eq!(local_timer.exec_start, "/usr/local/bin/sync.sh");
        assert!(!local_timer.timer_content.is_empty());

        let vendor_timer = section
            .timers
            .iter()
            .find(|t| t.name == "logrotate")
            .unwrap();
        assert_eq!(vendor_timer.source, TimerSource::Vendor);
        assert!(vendor_timer.timer_content.is_empty());
    }
}
