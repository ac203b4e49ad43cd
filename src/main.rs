fn main() -> anyhow::Result<()> {
    attendance_kiosk_lib::run()
}
