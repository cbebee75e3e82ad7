//! Outbound message texts (Indonesian with Sasak phrases).
//!
//! Pure formatting over core types; the protocol layer decides *which*
//! template fires, these functions only decide how it reads. Texts follow
//! the regional program's phrasing and are not part of the wire contract.

use posyandu_core::{
  baby::Baby,
  schedule::{ImmunizationType, Schedule, ScheduleEntry},
  worker::HealthWorker,
};

use crate::error::{CommandKind, ParseError};

const SIGNATURE: &str = "\"Anak sehat, desa kuat\" - Adat Sasak";

/// Fixed usage text for HELP/BANTUAN/TOLONGAN.
pub fn help() -> &'static str {
  "[Sistem Imunisasi Lombok Tengah]\n\
   \n\
   Format SMS yang bisa digunakan:\n\
   \n\
   1. DAFTAR BAYI:\n\
   REG#NAMA_BAYI#TGL_LAHIR#NAMA_IBU#DESA\n\
   Contoh: REG#AISHA#12-05-2024#SITI#PRAYA\n\
   \n\
   2. INFO JADWAL:\n\
   INFO#ID_BAYI\n\
   Contoh: INFO#LT-001\n\
   \n\
   3. LAPORAN PETUGAS:\n\
   LAPOR#ID_BAYI#JENIS_IMUNISASI\n\
   Contoh: LAPOR#LT-001#BCG\n\
   \n\
   4. BANTUAN:\n\
   HELP, BANTUAN, atau TOLONGAN\n\
   \n\
   \"Anak sehat, desa kuat\" - Adat Sasak"
}

/// One response per [`ParseError`] variant; none touch storage.
pub fn parse_error(err: &ParseError) -> String {
  match err {
    ParseError::InvalidFormat(CommandKind::Register) => {
      "Format pendaftaran salah.\n\
       Gunakan: REG#NAMA_BAYI#TGL_LAHIR#NAMA_IBU#DESA\n\
       Contoh: REG#AISHA#12-05-2024#SITI#PRAYA"
        .to_string()
    }
    ParseError::InvalidFormat(CommandKind::Report) => {
      "Format laporan salah.\n\
       Gunakan: LAPOR#ID_BAYI#JENIS_IMUNISASI\n\
       Contoh: LAPOR#LT-001#BCG"
        .to_string()
    }
    ParseError::InvalidFormat(CommandKind::Info) => {
      "Format permintaan info salah.\n\
       Gunakan: INFO#ID_BAYI\n\
       Contoh: INFO#LT-001"
        .to_string()
    }
    ParseError::InvalidDate(_) => {
      "Format tanggal salah.\n\
       Gunakan format: DD-MM-YYYY\n\
       Contoh: 12-05-2024"
        .to_string()
    }
    ParseError::Unrecognized => {
      "Format SMS tidak tepat.\n\
       Ketik HELP atau BANTUAN untuk panduan.\n\
       \n\
       Contoh: REG#AISHA#12-05-2024#SITI#PRAYA"
        .to_string()
    }
  }
}

pub fn registration_success(
  baby: &Baby,
  entries: &[ScheduleEntry],
  coordinator: Option<&str>,
) -> String {
  let mut lines = String::new();
  for (i, entry) in entries.iter().enumerate() {
    lines.push_str(&format!(
      "{}. {}: {}\n",
      i + 1,
      entry.immunization,
      entry.due_date.format("%d-%m-%Y")
    ));
  }

  format!(
    "[Lombok Tengah - Sistem Imunisasi]\n\
     \n\
     Matur suksma! Anak dedare {} (ID: {}) telah terdaftar.\n\
     \n\
     Jadwal Imunisasi:\n\
     {lines}\n\
     Kader desa: {}\n\
     {SIGNATURE}\n\
     Menangi le ngingatang!",
    baby.name,
    baby.baby_id,
    coordinator.unwrap_or("Koordinator desa"),
  )
}

pub fn already_registered(baby: &Baby) -> String {
  format!(
    "Bayi {} sudah terdaftar dengan ID: {}.\n\
     Ketik INFO#{} untuk info jadwal.",
    baby.name, baby.baby_id, baby.baby_id
  )
}

pub fn registration_failed() -> String {
  "Maaf, pendaftaran gagal diproses.\n\
   Silakan coba lagi atau hubungi Puskesmas."
    .to_string()
}

pub fn unauthorized_reporter() -> String {
  "Nomor ini tidak terdaftar sebagai petugas kesehatan.\n\
   Hubungi admin untuk registrasi petugas."
    .to_string()
}

/// Covers both "never scheduled" and "already completed" — intentionally
/// indistinguishable to the sender.
pub fn report_not_found(baby_id: &str, immunization: ImmunizationType) -> String {
  format!(
    "Jadwal imunisasi {immunization} untuk bayi {baby_id} tidak ditemukan \
     atau sudah selesai."
  )
}

/// The report lost a completion race; the other report already counted.
pub fn report_conflict(baby_id: &str, immunization: ImmunizationType) -> String {
  format!(
    "Laporan imunisasi {immunization} untuk bayi {baby_id} baru saja \
     tercatat oleh petugas lain."
  )
}

pub fn report_success(
  worker: &HealthWorker,
  immunization: ImmunizationType,
  baby: &Baby,
) -> String {
  format!(
    "Laporan diterima. Matur suksma {}!\n\
     Imunisasi {} untuk {} telah tercatat.",
    worker.name, immunization, baby.name
  )
}

pub fn baby_not_found(baby_id: &str) -> String {
  format!(
    "Bayi dengan ID {baby_id} tidak ditemukan.\n\
     Pastikan ID benar atau lakukan pendaftaran dulu."
  )
}

pub fn unauthorized_info() -> String {
  "Anda tidak berhak mengakses informasi ini.\n\
   Hanya orang tua atau petugas kesehatan yang dapat mengakses."
    .to_string()
}

pub fn info_response(
  baby: &Baby,
  completed_count: u64,
  upcoming: &[Schedule],
) -> String {
  let mut lines = String::new();
  for schedule in upcoming {
    lines.push_str(&format!(
      "- {}: {}\n",
      schedule.immunization,
      schedule.due_date.format("%d-%m-%Y")
    ));
  }
  if upcoming.is_empty() {
    lines.push_str("- (tidak ada)\n");
  }

  format!(
    "[Info Bayi {} - {}]\n\
     \n\
     Imunisasi selesai: {completed_count}\n\
     \n\
     Jadwal mendatang:\n\
     {lines}\n\
     \"Belek imunisasi, anak waras\" - Adat Sasak",
    baby.name, baby.baby_id,
  )
}

pub fn system_error() -> String {
  "Maaf, terjadi kesalahan sistem. Silakan coba lagi.".to_string()
}

// ─── Job templates ───────────────────────────────────────────────────────────

/// Reminder for a schedule falling due tomorrow.
pub fn reminder(baby: &Baby, schedule: &Schedule) -> String {
  format!(
    "[Lombok Tengah]\n\
     Bung, jadwal imunisasi {} ({}) besok {} di Puskesmas {}.\n\
     \n\
     \"Anak selamat, desa makmur\" - Pepatah Sasak\n\
     Tepak nane! (Jangan sampai terlewat!)",
    baby.name,
    schedule.immunization,
    schedule.due_date.format("%d-%m-%Y"),
    baby.village,
  )
}

/// Alert for a schedule the sweep just transitioned to overdue.
pub fn overdue_alert(baby: &Baby, schedule: &Schedule) -> String {
  format!(
    "[PENTING - Lombok Tengah]\n\
     Anak dedare {} belum imunisasi {} (jadwal: {}).\n\
     \n\
     Segera ke Puskesmas {} atau hubungi bidan desa.\n\
     \"Belek imunisasi te anak kite\" (Lengkapi imunisasi anak kita)",
    baby.name,
    schedule.immunization,
    schedule.due_date.format("%d-%m-%Y"),
    baby.village,
  )
}

/// Weekly educational text to a parent with open schedules.
pub fn weekly_education(mother_name: &str) -> String {
  format!(
    "[Edukasi Mingguan]\n\
     Bung {mother_name},\n\
     \n\
     \"Menangi le, belek imunisasi te anak kite\"\n\
     (Jangan lupa, lengkapi imunisasi anak kita)\n\
     \n\
     Manfaat imunisasi:\n\
     - Cegah polio, campak, hepatitis\n\
     - Anak tumbuh sehat dan kuat\n\
     - Lindungi generasi masa depan\n\
     \n\
     Konsultasi gratis di Puskesmas terdekat.\n\
     {SIGNATURE}"
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn each_parse_error_gets_a_distinct_usage_text() {
    let reg = parse_error(&ParseError::InvalidFormat(CommandKind::Register));
    let lapor = parse_error(&ParseError::InvalidFormat(CommandKind::Report));
    let info = parse_error(&ParseError::InvalidFormat(CommandKind::Info));
    assert!(reg.contains("REG#"));
    assert!(lapor.contains("LAPOR#"));
    assert!(info.contains("INFO#"));
    assert_ne!(reg, lapor);
    assert_ne!(lapor, info);
  }

  #[test]
  fn date_error_shows_the_expected_format() {
    let text = parse_error(&ParseError::InvalidDate("2024-05-12".to_string()));
    assert!(text.contains("DD-MM-YYYY"));
  }

  #[test]
  fn help_covers_every_command() {
    let text = help();
    for needle in ["REG#", "LAPOR#", "INFO#", "BANTUAN", "TOLONGAN"] {
      assert!(text.contains(needle), "missing {needle}");
    }
  }
}
